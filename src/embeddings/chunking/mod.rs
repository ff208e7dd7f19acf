
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ConfigError;
use crate::document::Page;

/// A contiguous slice of one page's text, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier derived from the page index and window start
    pub id: String,
    /// The raw window text, at most `chunk_size` characters
    pub text: String,
    /// 1-based page the text was taken from
    pub page_number: u32,
    /// Character offset of the window within the page text
    pub start_offset: usize,
}

/// Configuration for fixed-size window chunking. All sizes count characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Width of each window
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub overlap: usize,
    /// Windows whose trimmed length does not exceed this are dropped as noise
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 100,
            min_chunk_chars: 50,
        }
    }
}

impl ChunkingConfig {
    /// Distance between consecutive window starts
    #[inline]
    pub fn step(&self) -> Result<usize, ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(0));
        }
        if self.overlap >= self.chunk_size {
            return Err(ConfigError::OverlapTooLarge(self.overlap, self.chunk_size));
        }
        Ok(self.chunk_size - self.overlap)
    }
}

/// Build the identifier for the window starting at `start_offset` on `page_number`
#[inline]
pub fn chunk_id(page_number: u32, start_offset: usize) -> String {
    format!("p{}_c{}", page_number.saturating_sub(1), start_offset)
}

/// Split every page into overlapping windows, keeping only those with real content
#[inline]
pub fn chunk_pages(pages: &[Page], config: &ChunkingConfig) -> Result<Vec<Chunk>, ConfigError> {
    let step = config.step()?;
    let mut chunks = Vec::new();

    for page in pages {
        let page_chunks = chunk_page(page, config.chunk_size, step, config.min_chunk_chars);
        debug!(
            "Page {} produced {} chunks from {} characters",
            page.page_number,
            page_chunks.len(),
            page.raw_text.chars().count()
        );
        chunks.extend(page_chunks);
    }

    debug!(
        "Chunked {} pages into {} chunks",
        pages.len(),
        chunks.len()
    );

    Ok(chunks)
}

fn chunk_page(page: &Page, chunk_size: usize, step: usize, min_chars: usize) -> Vec<Chunk> {
    // Offsets are character positions so multi-byte text never splits a code point
    let chars: Vec<char> = page.raw_text.chars().collect();
    let mut chunks = Vec::new();

    for start in (0..chars.len()).step_by(step) {
        let end = (start + chunk_size).min(chars.len());
        let text: String = chars[start..end].iter().collect();

        if text.trim().chars().count() <= min_chars {
            continue;
        }

        chunks.push(Chunk {
            id: chunk_id(page.page_number, start),
            text,
            page_number: page.page_number,
            start_offset: start,
        });
    }

    chunks
}
