// Embeddings module
// Text chunking and the embedding capability used by the vector index

pub mod chunking;

pub use chunking::{Chunk, ChunkingConfig, chunk_id, chunk_pages};

use crate::Result;
use crate::ollama::OllamaClient;

/// Turns text into fixed-length vectors.
///
/// Ingestion and querying must go through the same implementation; vectors
/// from different models are not comparable and nothing downstream can tell.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Identifier of the underlying model, for logs and status output
    fn model_name(&self) -> &str;
}

impl Embedder for OllamaClient {
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text)
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_many(texts)
    }

    #[inline]
    fn model_name(&self) -> &str {
        self.embedding_model()
    }
}
