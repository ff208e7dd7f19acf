//! Offline stand-ins for the Ollama-backed capabilities

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::document::{Page, PageSource};
use crate::embeddings::Embedder;
use crate::generation::Generator;
use crate::{RagError, Result};

/// Bag-of-words embedder: each lowercase word bumps one hashed bucket.
/// Texts sharing words land close together under cosine distance.
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of texts embedded so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

impl Embedder for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0_f32; self.dimension];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(&word.to_lowercase()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        if vector.iter().all(|v| *v == 0.0) {
            vector[0] = 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        Ok(vector.into_iter().map(|v| v / norm).collect())
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Always fails the way an unreachable embedding model does
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::Embedding(
            "Failed to connect to Ollama at http://localhost:11434/api/embed".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Serves the same pages for any path
pub struct StaticPages(pub Vec<Page>);

impl StaticPages {
    pub fn from_texts(texts: &[String]) -> Self {
        Self(
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Page {
                    page_number: u32::try_from(i + 1).expect("page count fits"),
                    raw_text: text.clone(),
                })
                .collect(),
        )
    }
}

impl PageSource for StaticPages {
    fn extract_pages(&self, _path: &Path) -> Result<Vec<Page>> {
        Ok(self.0.clone())
    }
}

/// Records every prompt and answers with a fixed reply
pub struct ScriptedGenerator {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("prompt log lock").clone()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt log lock")
            .push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Always fails the way an unreachable model server does
pub struct UnavailableGenerator;

impl Generator for UnavailableGenerator {
    fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::Generation(
            "Failed to connect to Ollama at http://localhost:11434/api/generate".to_string(),
        ))
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

/// A page of `len` characters built from a repeating sentence
pub fn filler_page(sentence: &str, len: usize) -> String {
    sentence.chars().cycle().take(len).collect()
}
