#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Integration tests that require a local Ollama instance
// Run with: cargo test --test integration_ollama -- --ignored

use manual_rag::config::{GenerationConfig, OllamaConfig};
use manual_rag::embeddings::Embedder;
use manual_rag::generation::{Generator, OllamaGenerator};
use manual_rag::ollama::OllamaClient;
use std::env;
use std::time::Duration;
use tracing::info;

const TEST_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_OLLAMA_HOST: &str = "localhost";
const DEFAULT_OLLAMA_PORT: u16 = 11434;

fn create_integration_test_client() -> OllamaClient {
    let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
    let port = env::var("OLLAMA_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_OLLAMA_PORT);
    let embedding_model =
        env::var("OLLAMA_EMBEDDING_MODEL").unwrap_or_else(|_| TEST_MODEL.to_string());

    let config = OllamaConfig {
        host,
        port,
        embedding_model,
        batch_size: 4,
        ..OllamaConfig::default()
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_timeout(Duration::from_secs(120))
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b)
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_ollama_health_check() {
    init_test_tracing();
    let client = create_integration_test_client();

    let result = client.health_check();

    assert!(result.is_ok(), "Health check failed: {:?}", result.err());
}

#[test]
#[ignore = "requires a local Ollama instance"]
fn real_embeddings_have_consistent_dimension() {
    init_test_tracing();
    let client = create_integration_test_client();

    let texts = vec![
        "Torque the rear axle nut to 95 Nm.".to_string(),
        "Tighten the rear wheel spindle nut to the specified torque.".to_string(),
        "The fuel tank holds seven litres.".to_string(),
    ];
    let embeddings = client.embed_batch(&texts).expect("embeddings generated");

    assert_eq!(embeddings.len(), 3);
    assert!(embeddings.iter().all(|e| e.len() == embeddings[0].len()));
    info!("Embedding dimension: {}", embeddings[0].len());

    // Paraphrases should sit closer together than unrelated text
    assert!(cosine(&embeddings[0], &embeddings[1]) > cosine(&embeddings[0], &embeddings[2]));
}

#[test]
#[ignore = "requires a local Ollama instance with a generation model"]
fn real_generation_with_discovered_model() {
    init_test_tracing();
    let client = create_integration_test_client();

    let generator = OllamaGenerator::discover(client, &GenerationConfig::default());
    info!("Discovered model: {:?}", generator.choice());

    let reply = generator
        .generate("Reply with the single word: ready")
        .expect("generation succeeds");

    assert!(!reply.trim().is_empty());
}
