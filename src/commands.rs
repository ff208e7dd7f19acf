use anyhow::{Context, Result};
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::VectorIndex;
use crate::embeddings::Embedder;
use crate::ollama::OllamaClient;
use crate::rag::{IngestMode, RagEngine, Readiness};

fn load_config(base_dir: &Path) -> Result<Config> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Spinner on stderr, hidden when nobody is watching
fn spinner(message: &str) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new_spinner().with_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Extract, chunk and index a PDF manual
#[inline]
pub async fn ingest_manual(base_dir: &Path, pdf: &Path, reset: bool) -> Result<()> {
    let config = load_config(base_dir)?;

    if !pdf.is_file() {
        anyhow::bail!("Manual not found: {}", pdf.display());
    }

    let engine = RagEngine::from_config(&config)
        .await
        .context("Failed to initialize the question-answering engine")?;

    let mode = if reset {
        IngestMode::Reset
    } else {
        IngestMode::Merge
    };

    let bar = spinner(&format!("Indexing {}", pdf.display()));
    let result = engine.ingest_with(pdf, mode).await;
    bar.finish_and_clear();

    let chunks = result.with_context(|| format!("Failed to ingest {}", pdf.display()))?;
    let total = engine.count().await?;

    if chunks == 0 {
        println!(
            "{} No text could be extracted from {}",
            style("⚠").yellow(),
            pdf.display()
        );
    } else {
        println!(
            "{} Indexed {} chunks from {}",
            style("✓").green(),
            chunks,
            pdf.display()
        );
    }
    println!("  Collection '{}' now holds {} chunks", config.index.collection, total);

    Ok(())
}

/// Answer a question from the indexed manual
#[inline]
pub async fn ask(base_dir: &Path, question: &str, json: bool) -> Result<()> {
    let config = load_config(base_dir)?;
    let engine = RagEngine::from_config(&config)
        .await
        .context("Failed to initialize the question-answering engine")?;

    if engine.readiness().await? == Readiness::Unindexed {
        warn!("Asking against an empty index");
        eprintln!(
            "{} Nothing has been indexed yet. Use 'manual-rag ingest <PDF>' first.",
            style("⚠").yellow()
        );
    }

    let bar = spinner("Thinking");
    let result = engine.answer(question).await;
    bar.finish_and_clear();
    let answer = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.text);
        println!();
        println!("{}", style(answer.sources_label()).dim());
    }

    Ok(())
}

/// Show Ollama and index health
#[inline]
pub async fn show_status(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).unwrap_or_else(|e| {
        warn!("Falling back to default configuration: {:#}", e);
        Config {
            base_dir: base_dir.to_path_buf(),
            ..Config::default()
        }
    });

    println!("{}", style("Manual RAG Status").bold().cyan());
    println!("{}", "=".repeat(40));
    println!();

    println!("{}", style("Configuration:").bold());
    println!("   File: {}", config.config_file_path().display());
    println!("   Manual: {}", config.assistant.manual_name);
    match config.validate() {
        Ok(()) => println!("   {} Valid", style("✓").green()),
        Err(e) => println!("   {} Invalid - {}", style("✗").red(), e),
    }
    println!();

    println!("{}", style("Ollama:").bold());
    let client = match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            match client.health_check() {
                Ok(()) => println!(
                    "   {} Connected ({})",
                    style("✓").green(),
                    client.base_url()
                ),
                Err(e) => println!(
                    "   {} Unhealthy ({}) - {}",
                    style("⚠").yellow(),
                    client.base_url(),
                    e
                ),
            }
            println!("   Embedding model: {}", config.ollama.embedding_model);
            println!(
                "   Preferred generation models: {}",
                config.generation.preferred_models.join(", ")
            );
            Some(client)
        }
        Err(e) => {
            println!("   {} Failed to create client - {}", style("✗").red(), e);
            None
        }
    };
    println!();

    println!("{}", style("Vector Index:").bold());
    println!("   Path: {}", config.vector_database_path().display());
    let Some(client) = client else {
        println!("   Skipped: no Ollama client");
        return Ok(());
    };

    let embedder: Arc<dyn Embedder> = Arc::new(client);
    match VectorIndex::from_config(&config, embedder).await {
        Ok(index) => {
            println!(
                "   Collection: {} ({} dimensions)",
                index.collection(),
                index.dimension()
            );
            match index.count().await {
                Ok(0) => println!(
                    "   {} Empty - run 'manual-rag ingest <PDF>'",
                    style("⚠").yellow()
                ),
                Ok(chunks) => println!("   {} Ready ({} chunks)", style("✓").green(), chunks),
                Err(e) => println!("   {} Count failed - {}", style("✗").red(), e),
            }
        }
        Err(e) => println!("   {} Failed to open - {}", style("✗").red(), e),
    }

    Ok(())
}

/// Drop everything from the vector index
#[inline]
pub async fn reset_index(base_dir: &Path, assume_yes: bool) -> Result<()> {
    let config = load_config(base_dir)?;

    if !assume_yes
        && !Confirm::new()
            .with_prompt(format!(
                "Delete all indexed chunks in collection '{}'?",
                config.index.collection
            ))
            .default(false)
            .interact()?
    {
        println!("Aborted.");
        return Ok(());
    }

    let client = OllamaClient::new(&config.ollama)?;
    let index = VectorIndex::from_config(&config, Arc::new(client)).await?;
    let before = index.count().await?;
    index.clear().await?;

    info!("Cleared {} chunks", before);
    println!(
        "{} Removed {} chunks from '{}'",
        style("✓").green(),
        before,
        index.collection()
    );

    Ok(())
}
