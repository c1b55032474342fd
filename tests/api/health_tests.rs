//! Health Check and Metrics Tests

use axum::http::{header, StatusCode};
use serde_json::Value;

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_liveness() {
    let app = TestApp::new();

    let body: Value = app.server.get("/health/live").await.json();
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_on_memory_backend() {
    let app = TestApp::new();

    let response = app.server.get("/health/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"]["message"], "in-memory backend");
    assert_eq!(body["checks"]["queue"]["status"], "healthy");
    assert_eq!(body["checks"]["storage"]["status"], "healthy");
    assert_eq!(body["checks"]["websocket"]["active_sessions"], 0);
}

#[tokio::test]
async fn test_security_headers_present() {
    let app = TestApp::new();

    let response = app.server.get("/health").await;
    assert_eq!(response.header(header::X_CONTENT_TYPE_OPTIONS), "nosniff");
    assert_eq!(response.header(header::X_FRAME_OPTIONS), "DENY");
}

#[tokio::test]
async fn test_metrics_exposes_http_counters() {
    let app = TestApp::new();
    app.server.get("/health").await.assert_status_ok();

    let response = app.server.get("/metrics").await;
    response.assert_status_ok();
    assert!(response.text().contains("http_requests_total"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = TestApp::new();

    app.server
        .get("/api/does-not-exist")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
