use super::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> OllamaClient {
    let url = Url::parse(&server.uri()).expect("mock server uri parses");
    let config = OllamaConfig {
        host: url.host_str().expect("mock server has host").to_string(),
        port: url.port().expect("mock server has port"),
        batch_size: 2,
        ..OllamaConfig::default()
    };
    OllamaClient::new(&config).expect("Failed to create client")
}

fn tags_body() -> serde_json::Value {
    json!({
        "models": [
            {
                "name": "nomic-embed-text:latest",
                "size": 274302450,
                "digest": "0a109f422b47",
                "details": { "family": "nomic-bert", "families": ["nomic-bert"] }
            },
            {
                "name": "llama3.2:3b",
                "details": { "family": "llama", "parameter_size": "3.2B" }
            }
        ]
    })
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        embedding_model: "test-model".to_string(),
        batch_size: 128,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.embedding_model(), "test-model");
    assert_eq!(client.batch_size, 128);
    assert_eq!(client.base_url().host_str(), Some("test-host"));
    assert_eq!(client.base_url().port(), Some(1234));
    assert_eq!(client.timeout, Duration::from_secs(120));

    let client = client.with_timeout(Duration::from_secs(5));
    assert_eq!(client.timeout, Duration::from_secs(5));
}

#[test]
fn model_name_matching() {
    assert!(model_matches("llama3.2:latest", "llama3.2:latest"));
    assert!(model_matches("llama3.2:3b", "llama3.2"));
    assert!(model_matches("models/gemma2:2b", "gemma2:2b"));
    assert!(!model_matches("llama3.2:3b", "llama3.2:1b"));
    assert!(!model_matches("llama3.1:8b", "llama3"));
    assert!(!model_matches("mistral", "mistral-nemo"));
}

#[tokio::test]
async fn lists_models() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body()))
        .mount(&server)
        .await;

    let models = client_for(&server).list_models().expect("models listed");

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "nomic-embed-text:latest");
    assert_eq!(
        models[1]
            .details
            .as_ref()
            .and_then(|d| d.family.as_deref()),
        Some("llama")
    );
}

#[tokio::test]
async fn health_check_requires_embedding_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags_body()))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.health_check().is_ok());

    let url = Url::parse(&server.uri()).expect("uri parses");
    let missing = OllamaClient::new(&OllamaConfig {
        host: url.host_str().expect("host").to_string(),
        port: url.port().expect("port"),
        embedding_model: "mxbai-embed-large".to_string(),
        ..OllamaConfig::default()
    })
    .expect("client builds");
    assert!(matches!(
        missing.health_check(),
        Err(RagError::Embedding(_))
    ));
}

#[tokio::test]
async fn embeds_in_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["a", "b"] })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "embeddings": [[1.0, 0.0], [0.0, 1.0]] })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "input": ["c"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[0.5, 0.5]] })))
        .expect(1)
        .mount(&server)
        .await;

    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let embeddings = client_for(&server)
        .embed_many(&texts)
        .expect("embeddings generated");

    assert_eq!(
        embeddings,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test]
async fn embedding_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embeddings": [[1.0]] })))
        .mount(&server)
        .await;

    let texts = vec!["a".to_string(), "b".to_string()];
    let result = client_for(&server).embed_many(&texts);

    assert!(matches!(result, Err(RagError::Embedding(_))));
}

#[tokio::test]
async fn generates_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({ "model": "llama3.2:3b", "stream": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.2:3b",
            "response": "Tighten to 95 Nm.",
            "done": true
        })))
        .mount(&server)
        .await;

    let text = client_for(&server)
        .generate("llama3.2:3b", "What is the axle torque?")
        .expect("completion succeeds");

    assert_eq!(text, "Tighten to 95 Nm.");
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).generate("llama3.2:3b", "prompt");

    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let result = client_for(&server)
        .with_timeout(Duration::from_millis(200))
        .generate("llama3.2:3b", "prompt");

    assert!(matches!(result, Err(RagError::Timeout(_))));
}
