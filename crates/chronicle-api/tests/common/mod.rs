//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chronicle_core::clock::Clock;
use chronicle_core::store::EventStore;
use chronicle_event_store::PgEventStore;
use chronicle_test_support::{FixedClock, InMemoryEventStore};
use chronicle_users::domain::aggregates::User;
use chronicle_users::domain::commands::MIN_PASSWORD_COST;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use chronicle_api::state::AppState;

/// Fixed timestamp used across all integration tests.
fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 10, 0, 0).unwrap(),
    ))
}

fn build_app(users: Arc<dyn EventStore<User>>) -> Router {
    chronicle_api::app(AppState::new(fixed_clock(), users).with_password_cost(MIN_PASSWORD_COST))
}

/// Build the full app router over a real `PgEventStore`. Uses the same route
/// structure as `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app(Arc::new(PgEventStore::<User>::new(pool)))
}

/// Build the full app router over an in-memory store.
pub fn build_in_memory_app(store: &InMemoryEventStore<User>) -> Router {
    build_app(Arc::new(store.clone()))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

/// Send a request with a JSON body and return the response.
pub async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send_json(app, "POST", uri, body).await
}

/// Send a bodyless request and return the response.
pub async fn request(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    request(app, "GET", uri).await
}
