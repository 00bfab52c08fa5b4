//! HTTP contract tests for the index service client.

use std::time::Duration;

use endee_rag::{
    EndeeClient, IndexedRecord, RagConfig, RagError, RecordMeta, RetryPolicy, SpaceType,
    VectorIndex,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREATE: &str = "/api/v1/index/create";

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2,
    }
}

fn client(server: &MockServer) -> EndeeClient {
    EndeeClient::new(server.uri()).unwrap().with_retry(fast_retry())
}

fn record(id: &str, vector: Vec<f32>) -> IndexedRecord {
    IndexedRecord {
        id: id.to_string(),
        vector,
        meta: RecordMeta { text: "some text".into(), document_id: "doc".into(), chunk_index: 0 },
    }
}

async fn mount_create(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(CREATE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_is_idempotent_and_rejects_conflicting_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CREATE))
        .and(body_partial_json(json!({ "index_name": "kb", "dim": 384, "space_type": "cosine" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 384, SpaceType::Cosine).await.unwrap();
    client.create_index("kb", 384, SpaceType::Cosine).await.unwrap();

    let err = client.create_index("kb", 256, SpaceType::Cosine).await.unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)), "got {err:?}");
}

#[tokio::test]
async fn conflict_is_resolved_by_comparing_index_info() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CREATE))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({ "error": "index already exists" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/index/kb/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "dim": 384, "space_type": "cosine" })),
        )
        .mount(&server)
        .await;

    client(&server).create_index("kb", 384, SpaceType::Cosine).await.unwrap();

    let err = client(&server).create_index("kb", 256, SpaceType::Cosine).await.unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)), "got {err:?}");
}

#[tokio::test]
async fn transient_failure_is_retried() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/vector/insert"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/vector/insert"))
        .and(body_partial_json(json!({ "id": "doc#0", "meta": { "document_id": "doc" } })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 3, SpaceType::Cosine).await.unwrap();
    client.insert("kb", &record("doc#0", vec![0.1, 0.2, 0.3])).await.unwrap();
}

#[tokio::test]
async fn exhausted_retries_surface_service_unavailable() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 2, SpaceType::Cosine).await.unwrap();
    let err = client.search("kb", &[1.0, 0.0], 3).await.unwrap_err();
    match err {
        RagError::ServiceUnavailable { operation, attempts, .. } => {
            assert_eq!(operation, "search");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn request_timeout_is_transient_and_retried() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_millis(500)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let config = RagConfig::builder()
        .endpoint(server.uri())
        .dimensions(2)
        .request_timeout(Duration::from_millis(50))
        .build()
        .unwrap();
    let client = EndeeClient::from_config(&config).unwrap().with_retry(fast_retry());
    client.create_index("kb", 2, SpaceType::Cosine).await.unwrap();

    let err = client.search("kb", &[1.0, 0.0], 3).await.unwrap_err();
    match err {
        RagError::ServiceUnavailable { attempts, message, .. } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("timed out"), "got {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rate_limiting_is_transient() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 2, SpaceType::Cosine).await.unwrap();
    assert!(client.search("kb", &[1.0, 0.0], 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/vector/insert"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "bad metadata" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 2, SpaceType::Cosine).await.unwrap();
    let err = client.insert("kb", &record("doc#0", vec![1.0, 0.0])).await.unwrap_err();
    match err {
        RagError::Index { index, status, message } => {
            assert_eq!(index, "kb");
            assert_eq!(status, 400);
            assert_eq!(message, "bad metadata");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn wrong_length_vector_never_reaches_the_network() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/vector/insert"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 384, SpaceType::Cosine).await.unwrap();
    let err = client.insert("kb", &record("doc#0", vec![0.5; 383])).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn unsafe_index_names_are_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    for name in ["kb?x", "kb/../other", "kb#frag", "..", "kb x", ""] {
        let err = client.create_index(name, 2, SpaceType::Cosine).await.unwrap_err();
        assert!(matches!(err, RagError::Validation(_)), "{name:?}: got {err:?}");
    }
    let err = client.insert("kb?x", &record("doc#0", vec![1.0, 0.0])).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)), "got {err:?}");
    let err = client.search("kb?x", &[1.0, 0.0], 3).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn unknown_index_dimension_is_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/index/kb/info"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "dimension": 2, "space_type": "ip" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/vector/insert"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = client(&server);
    client.insert("kb", &record("a", vec![1.0, 0.0])).await.unwrap();
    client.insert("kb", &record("b", vec![0.0, 1.0])).await.unwrap();

    let err = client.insert("kb", &record("c", vec![1.0, 0.0, 0.0])).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn missing_index_is_an_index_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/index/ghost/info"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "no such index" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).search("ghost", &[1.0], 1).await.unwrap_err();
    assert!(matches!(err, RagError::Index { status: 404, .. }), "got {err:?}");
}

#[tokio::test]
async fn search_returns_at_most_k_hits_in_service_order() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .and(body_partial_json(json!({ "k": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "meta": { "text": "one", "document_id": "a", "chunk_index": 0 }, "score": 0.9 },
            { "meta": { "text": "two", "document_id": "a", "chunk_index": 1 }, "score": 0.7 },
            { "meta": { "text": "three", "document_id": "b", "chunk_index": 0 }, "score": 0.2 }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .and(body_partial_json(json!({ "k": 10 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "metadata": { "text": "only", "document_id": "a", "chunk_index": 0 }, "score": 0.5 }
            ]
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 2, SpaceType::Cosine).await.unwrap();

    let result = client.search("kb", &[1.0, 0.0], 2).await.unwrap();
    let texts: Vec<&str> = result.iter().map(|h| h.meta.text.as_str()).collect();
    assert_eq!(texts, ["one", "two"]);

    // Fewer records than k, wrapped response shape
    let result = client.search("kb", &[1.0, 0.0], 10).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.top().unwrap().meta.text, "only");
}

#[tokio::test]
async fn empty_search_body_is_an_empty_result() {
    let server = MockServer::start().await;
    mount_create(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/index/kb/search"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(&server);
    client.create_index("kb", 2, SpaceType::Cosine).await.unwrap();
    assert!(client.search("kb", &[1.0, 0.0], 3).await.unwrap().is_empty());

    let err = client.search("kb", &[1.0, 0.0], 0).await.unwrap_err();
    assert!(matches!(err, RagError::Validation(_)));
}

#[tokio::test]
async fn health_reports_reachability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    assert!(client(&server).health().await);

    let unhealthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&unhealthy)
        .await;
    assert!(!client(&unhealthy).health().await);
}

#[test]
fn empty_endpoint_is_a_configuration_error() {
    assert!(matches!(EndeeClient::new(""), Err(RagError::Configuration(_))));
    let client = EndeeClient::new("http://localhost:8080/").unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080");
}
