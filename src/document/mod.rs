// Document source
// Turns a manual on disk into per-page text


use std::path::Path;
use tracing::{debug, info, warn};

use crate::{RagError, Result};

/// One page of extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number
    pub page_number: u32,
    pub raw_text: String,
}

/// Anything that can turn a document path into ordered pages
pub trait PageSource: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>>;
}

/// Extracts page text from PDF files
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageSource;

impl PageSource for PdfPageSource {
    #[inline]
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>> {
        debug!("Loading PDF from {}", path.display());

        let document = lopdf::Document::load(path).map_err(|e| {
            RagError::DocumentRead(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let page_numbers: Vec<u32> = document.get_pages().into_keys().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());

        for page_number in page_numbers {
            // A single page without extractable text (scans, figures) should not sink the manual
            let raw_text = document.extract_text(&[page_number]).unwrap_or_else(|e| {
                warn!("No text extracted from page {}: {}", page_number, e);
                String::new()
            });

            pages.push(Page {
                page_number,
                raw_text,
            });
        }

        info!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}
