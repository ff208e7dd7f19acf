// LanceDB vector database module
// Stores chunk embeddings and answers nearest-neighbour queries


pub mod vector_store;

pub use vector_store::VectorIndex;

use serde::{Deserialize, Serialize};

/// One row of the vector table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedVector {
    /// Chunk identifier, unique within the collection
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    /// 1-based page the chunk came from
    pub page_number: u32,
    /// Character offset of the chunk within its page
    pub start_offset: usize,
    /// RFC 3339 timestamp of the write
    pub indexed_at: String,
}

/// A search hit, nearest first in result lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub text: String,
    pub page_number: u32,
    /// Cosine distance to the query; smaller is closer
    pub distance: f32,
}

impl RetrievedChunk {
    /// Cosine similarity derived from the stored distance
    #[inline]
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}
