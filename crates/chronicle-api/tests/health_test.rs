//! Integration tests for the health endpoint.

mod common;

use axum::http::StatusCode;
use chronicle_test_support::InMemoryEventStore;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let app = common::build_in_memory_app(&InMemoryEventStore::new());

    let (status, json) = common::get_json(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["user_events"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_in_memory_app(&InMemoryEventStore::new());

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/v1/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
