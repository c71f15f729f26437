use super::*;
use crate::orchestrator::test_helpers::{FakeEngine, Step, create_test_orchestrator, wait_terminal};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;


/// Helper to create a test orchestrator wrapped in Arc, plus a router over it
async fn create_test_app(steps: Vec<Step>) -> (Router, Arc<Orchestrator>, tempfile::TempDir) {
    let engine = Arc::new(FakeEngine::new(steps));
    let (orchestrator, temp_dir) = create_test_orchestrator(engine).await;
    let orchestrator = Arc::new(orchestrator);
    let app = create_router(orchestrator.clone(), orchestrator.get_config());
    (app, orchestrator, temp_dir)
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_api_server_spawns() {
    let engine = Arc::new(FakeEngine::new(vec![Step::Nothing]));
    let (orchestrator, _temp_dir) = create_test_orchestrator(engine).await;

    let mut config = (*orchestrator.get_config()).clone();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let orchestrator = Arc::new(orchestrator);
        let config = config.clone();
        async move { start_api_server(orchestrator, config).await }
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!api_handle.is_finished());
    api_handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _orchestrator, _temp_dir) = create_test_app(vec![Step::Nothing]).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_specific_origin() {
    let engine = Arc::new(FakeEngine::new(vec![Step::Nothing]));
    let (orchestrator, _temp_dir) = create_test_orchestrator(engine).await;

    let mut config = (*orchestrator.get_config()).clone();
    config.api.cors_origins = vec!["http://allowed.example".to_string()];
    let app = create_router(Arc::new(orchestrator), Arc::new(config));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("Origin", "http://allowed.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://allowed.example"
    );
}
