//! Chronicle API server entry point.

use std::sync::Arc;

use chronicle_api::config::ServerConfig;
use chronicle_api::error::AppError;
use chronicle_api::state::AppState;
use chronicle_core::clock::SystemClock;
use chronicle_event_store::PgEventStore;
use chronicle_users::domain::aggregates::User;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Chronicle API server");

    let config = ServerConfig::from_env()?;

    // Create database connection pool.
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;

    if config.run_migrations {
        sqlx::migrate!("../../migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let app_state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(PgEventStore::<User>::new(pool)),
    )
    .with_password_cost(config.password_cost);

    // TODO: Replace CorsLayer::permissive() with restricted origins for production.
    let app = chronicle_api::app(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = config.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
