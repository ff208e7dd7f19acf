use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Document read error: {0}")]
    DocumentRead(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Short machine-readable name of the failure kind
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DocumentRead(_) => "document_read",
            Self::Config(_) => "configuration",
            Self::Index(_) => "index",
            Self::Embedding(_) => "embedding",
            Self::Generation(_) => "generation",
            Self::Timeout(_) => "timeout",
            Self::InvalidInput(_) => "invalid_input",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

impl From<config::ConfigError> for RagError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod ollama;
pub mod rag;

#[cfg(test)]
pub(crate) mod test_support;
