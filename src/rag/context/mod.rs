
use std::collections::BTreeSet;

use itertools::Itertools;

use crate::database::RetrievedChunk;

/// Separator placed between retrieved chunks in the grounding context
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// What retrieval produced for one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assembly {
    /// Nothing was retrieved; the question cannot be grounded
    NoRelevantContext,
    Grounded {
        /// Chunk texts in rank order
        context: String,
        /// Distinct pages the context was drawn from
        pages: BTreeSet<u32>,
    },
}

/// Merge ranked search hits into one context block with its provenance
#[inline]
pub fn assemble(results: &[RetrievedChunk]) -> Assembly {
    if results.is_empty() {
        return Assembly::NoRelevantContext;
    }

    Assembly::Grounded {
        context: results.iter().map(|r| r.text.as_str()).join(CHUNK_SEPARATOR),
        pages: results.iter().map(|r| r.page_number).collect(),
    }
}
