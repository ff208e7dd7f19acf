#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OllamaConfig;
use crate::{RagError, Result};

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

/// Blocking client for the handful of Ollama endpoints this crate needs.
///
/// Requests are never retried here: a failure is returned to the caller,
/// and a request that exceeds the configured timeout becomes [`RagError::Timeout`].
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    embedding_model: String,
    batch_size: u32,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
    pub details: Option<ModelDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDetails {
    pub format: Option<String>,
    pub family: Option<String>,
    pub families: Option<Vec<String>>,
    pub parameter_size: Option<String>,
    pub quantization_level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Which capability a request belongs to, so failures land in the right error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Tags,
    Embed,
    Generate,
}

impl Endpoint {
    const fn path(self) -> &'static str {
        match self {
            Self::Tags => "/api/tags",
            Self::Embed => "/api/embed",
            Self::Generate => "/api/generate",
        }
    }

    fn failure(self, message: String) -> RagError {
        match self {
            Self::Tags => RagError::Other(anyhow::anyhow!(message)),
            Self::Embed => RagError::Embedding(message),
            Self::Generate => RagError::Generation(message),
        }
    }
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let base_url = config.ollama_url()?;
        let timeout = Duration::from_secs(config.timeout_secs);

        Ok(Self {
            base_url,
            embedding_model: config.embedding_model.clone(),
            batch_size: config.batch_size.max(1),
            timeout,
            agent: build_agent(timeout),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    /// Test connection to Ollama server and verify the embedding model is installed
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models()?;
        if !models
            .iter()
            .any(|m| model_matches(&m.name, &self.embedding_model))
        {
            let available: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.embedding_model, available
            );
            return Err(RagError::Embedding(format!(
                "Model '{}' is not available. Available models: {:?}",
                self.embedding_model, available
            )));
        }

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.embedding_model
        );
        Ok(())
    }

    /// List all installed models
    #[inline]
    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.endpoint_url(Endpoint::Tags)?;
        debug!("Fetching available models from {}", url);

        let response_text = self.execute(Endpoint::Tags, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let models_response: ModelsResponse = serde_json::from_str(&response_text)
            .map_err(|e| Endpoint::Tags.failure(format!("Failed to parse models response: {}", e)))?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    /// Embed a single text
    #[inline]
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_single_batch(&[text.to_string()])?;
        embeddings
            .pop()
            .ok_or_else(|| RagError::Embedding("Empty embedding response".to_string()))
    }

    /// Embed many texts, `batch_size` at a time, preserving input order
    #[inline]
    pub fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size as usize) {
            results.extend(self.embed_single_batch(batch)?);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }

    /// Run a non-streaming completion against `model`
    #[inline]
    pub fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = self.endpoint_url(Endpoint::Generate)?;
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            Endpoint::Generate.failure(format!("Failed to serialize request: {}", e))
        })?;

        debug!(
            "Requesting completion from {} (prompt length: {})",
            model,
            prompt.len()
        );

        let response_text = self.execute(Endpoint::Generate, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: GenerateResponse = serde_json::from_str(&response_text).map_err(|e| {
            Endpoint::Generate.failure(format!("Failed to parse completion response: {}", e))
        })?;

        debug!("Completion returned {} characters", response.response.len());
        Ok(response.response)
    }

    fn embed_single_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint_url(Endpoint::Embed)?;
        let request = EmbedRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let request_json = serde_json::to_string(&request).map_err(|e| {
            Endpoint::Embed.failure(format!("Failed to serialize embedding request: {}", e))
        })?;

        let response_text = self.execute(Endpoint::Embed, || {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&request_json)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })?;

        let response: EmbedResponse = serde_json::from_str(&response_text).map_err(|e| {
            Endpoint::Embed.failure(format!("Failed to parse embedding response: {}", e))
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.embeddings.len()
            )));
        }

        if let Some(first) = response.embeddings.first() {
            let dimension = first.len();
            if dimension == 0 || response.embeddings.iter().any(|e| e.len() != dimension) {
                return Err(RagError::Embedding(
                    "Embedding response contained vectors of inconsistent length".to_string(),
                ));
            }
        }

        Ok(response.embeddings)
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url> {
        self.base_url.join(endpoint.path()).map_err(|e| {
            RagError::Config(format!(
                "Failed to build URL for {}: {}",
                endpoint.path(),
                e
            ))
        })
    }

    fn execute<F>(&self, endpoint: Endpoint, request_fn: F) -> Result<String>
    where
        F: FnOnce() -> std::result::Result<String, ureq::Error>,
    {
        request_fn().map_err(|error| match error {
            ureq::Error::Timeout(_) => {
                warn!(
                    "Request to {} exceeded {:?}",
                    endpoint.path(),
                    self.timeout
                );
                RagError::Timeout(format!(
                    "{} did not answer within {:?}",
                    endpoint.path(),
                    self.timeout
                ))
            }
            ureq::Error::StatusCode(status) => {
                warn!("Ollama returned HTTP {} for {}", status, endpoint.path());
                endpoint.failure(format!("HTTP {} from {}", status, endpoint.path()))
            }
            other => {
                warn!("Transport error calling {}: {}", endpoint.path(), other);
                endpoint.failure(format!("Request to {} failed: {}", endpoint.path(), other))
            }
        })
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .build()
        .into()
}

/// Whether an installed model name satisfies a requested one.
/// A request without a tag (`llama3.2`) matches any tag of that model.
#[inline]
pub fn model_matches(installed: &str, requested: &str) -> bool {
    if installed == requested {
        return true;
    }

    let installed = installed.strip_prefix("models/").unwrap_or(installed);
    if installed == requested {
        return true;
    }

    !requested.contains(':')
        && installed
            .split_once(':')
            .is_some_and(|(base, _)| base == requested)
}
