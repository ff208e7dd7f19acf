//! Retrieval-augmented question answering
//!
//! Ingest: pages → chunks → vector index. Query: vector index → context →
//! prompt → generator → [`Answer`].

pub mod context;
pub mod engine;
pub mod prompt;


pub use context::{Assembly, assemble};
pub use engine::{EngineOptions, IngestMode, RagEngine, Readiness};
pub use prompt::PromptBuilder;

use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeSet;

/// A generated reply and the manual pages it was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub text: String,
    pub source_pages: BTreeSet<u32>,
}

impl Answer {
    /// Reply used when retrieval finds nothing to ground on
    #[inline]
    pub fn not_found(manual_name: &str) -> Self {
        Self {
            text: format!(
                "I'm sorry, I couldn't find any information regarding that in the {}.",
                manual_name
            ),
            source_pages: BTreeSet::new(),
        }
    }

    /// Human-readable provenance line
    #[inline]
    pub fn sources_label(&self) -> String {
        if self.source_pages.is_empty() {
            "No relevant pages found.".to_string()
        } else {
            format!("Manual pages: {}", self.source_pages.iter().join(", "))
        }
    }
}
