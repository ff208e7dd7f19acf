
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::context::{Assembly, assemble};
use super::prompt::PromptBuilder;
use super::Answer;
use crate::config::Config;
use crate::database::VectorIndex;
use crate::document::{PageSource, PdfPageSource};
use crate::embeddings::{ChunkingConfig, Embedder, chunk_pages};
use crate::generation::{Generator, OllamaGenerator};
use crate::ollama::OllamaClient;
use crate::{RagError, Result};

/// How an ingest treats chunks already in the index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// Upsert on chunk id; entries from earlier ingests that are not overwritten stay
    #[default]
    Merge,
    /// Empty the collection before writing
    Reset,
}

/// Whether questions can be answered from indexed content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Unindexed,
    Ready { chunks: usize },
}

/// Tunables the engine reads once at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub manual_name: String,
}

impl Default for EngineOptions {
    #[inline]
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineOptions {
    #[inline]
    fn from(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            top_k: config.retrieval.top_k,
            manual_name: config.assistant.manual_name.clone(),
        }
    }
}

/// Long-lived pipeline over one manual, shared behind `Arc`.
///
/// Questions are answered concurrently. Ingest and clear hold a lock so
/// writes never interleave.
pub struct RagEngine {
    page_source: Arc<dyn PageSource>,
    index: VectorIndex,
    generator: Arc<dyn Generator>,
    chunking: ChunkingConfig,
    top_k: usize,
    prompts: PromptBuilder,
    write_lock: Mutex<()>,
}

impl RagEngine {
    /// Assemble an engine from its collaborators.
    ///
    /// Chunking and retrieval settings are checked here so a bad overlap is
    /// reported before any document is read.
    #[inline]
    pub fn new(
        page_source: Arc<dyn PageSource>,
        index: VectorIndex,
        generator: Arc<dyn Generator>,
        options: EngineOptions,
    ) -> Result<Self> {
        options.chunking.step()?;
        if options.top_k == 0 {
            return Err(RagError::Config(
                "Retrieval top_k must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            page_source,
            index,
            generator,
            chunking: options.chunking,
            top_k: options.top_k,
            prompts: PromptBuilder::new(options.manual_name),
            write_lock: Mutex::new(()),
        })
    }

    /// Wire up the Ollama-backed engine described by `config`.
    ///
    /// Model discovery happens once here; an unreachable server leaves the
    /// configured default generation model in place.
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let client = OllamaClient::new(&config.ollama)?;
        let embedder: Arc<dyn Embedder> = Arc::new(client.clone());
        let index = VectorIndex::from_config(config, embedder).await?;
        let generator = OllamaGenerator::discover(client, &config.generation);

        Self::new(
            Arc::new(PdfPageSource),
            index,
            Arc::new(generator),
            EngineOptions::from(config),
        )
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub fn manual_name(&self) -> &str {
        self.prompts.manual_name()
    }

    /// Index a document, merging with what is already stored
    #[inline]
    pub async fn ingest(&self, path: &Path) -> Result<usize> {
        self.ingest_with(path, IngestMode::Merge).await
    }

    /// Extract, chunk and index a document. Returns the number of chunks written;
    /// zero is a valid outcome for a document with no usable text.
    #[inline]
    pub async fn ingest_with(&self, path: &Path, mode: IngestMode) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        info!("Ingesting {} ({:?})", path.display(), mode);

        let pages = self.page_source.extract_pages(path)?;
        let chunks = chunk_pages(&pages, &self.chunking)?;
        debug!("{} pages produced {} chunks", pages.len(), chunks.len());

        let records = self.index.embed_chunks(&chunks)?;

        if mode == IngestMode::Reset {
            self.index.clear().await?;
        }

        self.index.upsert_vectors(records).await?;

        if !chunks.is_empty() {
            if let Err(e) = self.index.optimize().await {
                warn!("Index optimization after ingest failed: {}", e);
            }
        }

        info!(
            "Indexed {} chunks from {}",
            chunks.len(),
            path.display()
        );
        Ok(chunks.len())
    }

    /// Answer a question from the indexed manual
    #[inline]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput(
                "Question must not be empty".to_string(),
            ));
        }

        let results = self.index.search(question, self.top_k).await?;
        debug!("Retrieved {} chunks for question", results.len());

        match assemble(&results) {
            Assembly::NoRelevantContext => {
                info!("No indexed content to ground the question on");
                Ok(Answer::not_found(self.manual_name()))
            }
            Assembly::Grounded { context, pages } => {
                let prompt = self.prompts.build(&context, question);
                let text = self.generator.generate(&prompt)?;
                Ok(Answer {
                    text: text.trim().to_string(),
                    source_pages: pages,
                })
            }
        }
    }

    /// Number of indexed chunks
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        self.index.count().await
    }

    #[inline]
    pub async fn readiness(&self) -> Result<Readiness> {
        Ok(match self.count().await? {
            0 => Readiness::Unindexed,
            chunks => Readiness::Ready { chunks },
        })
    }

    /// Drop every indexed chunk
    #[inline]
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.index.clear().await
    }
}
