//! Chronicle HTTP API.
//!
//! The binary in `main.rs` wires configuration, the database pool and the
//! router built here.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::Router;

use crate::state::AppState;

/// Builds the application router over `state`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/users", routes::users::router())
        .with_state(state)
}
