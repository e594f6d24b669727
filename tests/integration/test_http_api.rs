//! End-to-end tests of the HTTP routes against a stub-embedded corpus.

use crate::common::{SlowEmbedder, TestProject};
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use ragrepo::server::{AppState, router};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

async fn get(state: AppState, uri: &str) -> Response {
    router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

fn ready_state(project: &TestProject) -> AppState {
    let settings = project.settings();
    let engine = project.engine(&settings);
    AppState::with_engine(&settings, engine)
}

#[tokio::test]
async fn test_search_returns_ranked_identifiers() {
    let project = TestProject::with_corpus();
    let state = ready_state(&project);

    let response = get(state.clone(), "/search?query=cat").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        serde_json::json!(["cats.md", "dogs.md", "guides/rust.md"])
    );

    let response = get(state, "/search?query=rust%20search").await;
    assert_eq!(response.status(), StatusCode::OK);
    let ids = body_json(response).await;
    assert_eq!(ids[0], "guides/rust.md");
}

#[tokio::test]
async fn test_search_respects_top_k() {
    let project = TestProject::with_corpus();
    let mut settings = project.settings();
    settings.search.top_k = 1;
    let engine = project.engine(&settings);
    let state = AppState::with_engine(&settings, engine);

    let response = get(state, "/search?query=dog").await;
    assert_eq!(body_json(response).await, serde_json::json!(["dogs.md"]));
}

#[tokio::test]
async fn test_search_rejects_bad_queries() {
    let project = TestProject::with_corpus();
    let state = ready_state(&project);

    for uri in ["/search", "/search?query=", "/search?query=%20%20"] {
        let response = get(state.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_QUERY", "{uri}");
    }

    // Nothing in the vocabulary: zero query vector
    let response = get(state, "/search?query=zebra").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_rejects_malformed_query_string() {
    let project = TestProject::with_corpus();
    let state = ready_state(&project);

    let response = get(state, "/search?query=cat&query=dog").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "INVALID_QUERY");
}

#[tokio::test]
async fn test_slow_search_times_out() {
    let project = TestProject::with_corpus();
    let mut settings = project.settings();
    settings.server.request_timeout_ms = 10;
    let slow = SlowEmbedder {
        delay: Duration::from_millis(300),
    };
    let engine = project.engine_with(&settings, Arc::new(slow));
    let state = AppState::with_engine(&settings, engine);

    let response = get(state, "/search?query=cat").await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "TIMEOUT");
}

#[tokio::test]
async fn test_content_renders_markdown() {
    let project = TestProject::with_corpus();
    let state = ready_state(&project);

    let response = get(state, "/content/guides/rust.md").await;
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("<h1>Rust</h1>"));
}

#[tokio::test]
async fn test_content_rejects_traversal_and_missing() {
    let project = TestProject::with_corpus();
    project.add_file("secret.md", "# Secret");
    let state = ready_state(&project);

    let response = get(state.clone(), "/content/%2E%2E/secret.md").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "PATH_TRAVERSAL");

    let response = get(state, "/content/missing.md").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_static_files_are_served() {
    let project = TestProject::with_corpus();
    let state = ready_state(&project);

    let response = get(state.clone(), "/static/style.css").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "body { margin: 0; }");

    let response = get(state, "/static/missing.css").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_readiness_before_and_after_build() {
    let project = TestProject::with_corpus();
    let settings = project.settings();
    let state = AppState::new(&settings);

    let response = get(state.clone(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(!state.is_ready());
    let response = get(state.clone(), "/ready").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = get(state.clone(), "/search?query=cat").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_READY");

    assert!(state.install(project.engine(&settings)));
    assert!(!state.install(project.engine(&settings)));
    assert!(state.is_ready());

    let response = get(state.clone(), "/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["documents"], 3);
    assert_eq!(body["model"], "stub-vocabulary");

    let response = get(state, "/search?query=cat").await;
    assert_eq!(response.status(), StatusCode::OK);
}
