//! HTTP contract of the Gemini embedding client.

use finquery::embedding::{Embedder, GeminiEmbedder};
use finquery::FinqueryError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn values(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32 / n as f32).collect()
}

#[tokio::test]
async fn test_embed_sends_task_type_and_dimensionality() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/text-embedding-004:embedContent"))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "model": "models/text-embedding-004",
            "taskType": "RETRIEVAL_DOCUMENT",
            "outputDimensionality": 768,
            "content": { "parts": [{ "text": "What dividend was declared?" }] }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": values(768) }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = GeminiEmbedder::new(
        &server.uri(),
        "test-key",
        "text-embedding-004",
        768,
        Some("RETRIEVAL_DOCUMENT".to_string()),
    )
    .unwrap();

    let embedding = embedder.embed("What dividend was declared?").await.unwrap();
    assert_eq!(embedding.len(), 768);
    assert_eq!(embedding[0], 0.0);
}

#[tokio::test]
async fn test_embed_batch_keeps_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-embedding-001:batchEmbedContents"))
        .and(body_partial_json(json!({
            "requests": [
                { "content": { "parts": [{ "text": "first" }] }, "outputDimensionality": 4 },
                { "content": { "parts": [{ "text": "second" }] }, "outputDimensionality": 4 }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [
                { "values": [1.0, 0.0, 0.0, 0.0] },
                { "values": [0.0, 1.0, 0.0, 0.0] }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let embedder =
        GeminiEmbedder::new(&server.uri(), "test-key", "models/gemini-embedding-001", 4, None).unwrap();

    let embeddings = embedder
        .embed_batch(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();
    assert_eq!(embeddings, vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0, 1.0, 0.0, 0.0]]);
}

#[tokio::test]
async fn test_error_status_and_wrong_width_are_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/bad-model:embedContent"))
        .respond_with(ResponseTemplate::new(400).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/models/narrow-model:embedContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embedding": { "values": [0.5, 0.5] }
        })))
        .mount(&server)
        .await;

    let bad = GeminiEmbedder::new(&server.uri(), "k", "bad-model", 768, None).unwrap();
    match bad.embed("q").await {
        Err(FinqueryError::Embedding(msg)) => assert!(msg.contains("API key not valid")),
        other => panic!("expected embedding error, got {:?}", other),
    }

    let narrow = GeminiEmbedder::new(&server.uri(), "k", "narrow-model", 768, None).unwrap();
    assert!(matches!(narrow.embed("q").await, Err(FinqueryError::Embedding(_))));
}
