//! Text generation
//!
//! The [`Generator`] capability plus the start-up policy that decides which
//! installed model answers questions.


use tracing::{info, warn};

use crate::Result;
use crate::config::GenerationConfig;
use crate::ollama::{ModelInfo, OllamaClient, model_matches};

/// Produces a completion for a fully rendered prompt
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}

/// One step of the model selection chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRule {
    /// A specific model, by full tag or by bare name
    Named(String),
    /// Any installed model able to produce text
    AnyCapable,
}

impl ModelRule {
    fn pick<'a>(&self, available: &'a [ModelInfo]) -> Option<&'a ModelInfo> {
        match self {
            Self::Named(name) => available.iter().find(|m| model_matches(&m.name, name)),
            Self::AnyCapable => available.iter().find(|m| is_text_model(m)),
        }
    }
}

/// Outcome of model selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub name: String,
    /// The configured default was used because discovery failed or found nothing
    pub fallback: bool,
}

/// Preferred models in configured order, then anything capable
#[inline]
pub fn selection_rules(config: &GenerationConfig) -> Vec<ModelRule> {
    config
        .preferred_models
        .iter()
        .map(|name| ModelRule::Named(name.clone()))
        .chain(std::iter::once(ModelRule::AnyCapable))
        .collect()
}

/// First rule that matches an installed model wins
#[inline]
pub fn select_model(available: &[ModelInfo], rules: &[ModelRule]) -> Option<String> {
    rules
        .iter()
        .find_map(|rule| rule.pick(available))
        .map(|model| model.name.clone())
}

/// Apply the selection chain to a discovery result, degrading to the configured default
#[inline]
pub fn resolve_model(discovered: Result<Vec<ModelInfo>>, config: &GenerationConfig) -> ModelChoice {
    let available = match discovered {
        Ok(models) => models,
        Err(e) => {
            warn!(
                "Error listing models, defaulting to {}: {}",
                config.default_model, e
            );
            return ModelChoice {
                name: config.default_model.clone(),
                fallback: true,
            };
        }
    };

    match select_model(&available, &selection_rules(config)) {
        Some(name) => ModelChoice {
            name,
            fallback: false,
        },
        None => {
            warn!(
                "No usable generation model among {} installed, defaulting to {}",
                available.len(),
                config.default_model
            );
            ModelChoice {
                name: config.default_model.clone(),
                fallback: true,
            }
        }
    }
}

/// Embedding-only models cannot answer questions
fn is_text_model(model: &ModelInfo) -> bool {
    let name = model.name.to_lowercase();
    if name.contains("embed") || name.contains("minilm") {
        return false;
    }

    let Some(details) = &model.details else {
        return true;
    };

    let is_bert = |family: &str| family.to_lowercase().ends_with("bert");
    !details.family.as_deref().is_some_and(is_bert)
        && !details
            .families
            .as_deref()
            .is_some_and(|families| families.iter().any(|f| is_bert(f)))
}

/// Completion through Ollama with a model fixed at construction
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    choice: ModelChoice,
}

impl OllamaGenerator {
    /// Discover installed models once and pick one. Never fails: an unreachable
    /// server leaves the configured default in place.
    #[inline]
    pub fn discover(client: OllamaClient, config: &GenerationConfig) -> Self {
        let choice = resolve_model(client.list_models(), config);
        info!(
            "Using generation model: {}{}",
            choice.name,
            if choice.fallback { " (fallback)" } else { "" }
        );
        Self { client, choice }
    }

    #[inline]
    pub fn choice(&self) -> &ModelChoice {
        &self.choice
    }
}

impl Generator for OllamaGenerator {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        self.client.generate(&self.choice.name, prompt)
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.choice.name
    }
}
