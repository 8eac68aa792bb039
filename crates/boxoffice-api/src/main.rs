//! Box Office API server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use boxoffice_api::config::AppConfig;
use boxoffice_api::error::AppError;
use boxoffice_api::state::AppState;
use boxoffice_api::{app, telemetry};
use boxoffice_core::id::UuidGenerator;
use boxoffice_core::time::SystemClock;
use boxoffice_event_store::pg_store::PgKeyValueStore;
use boxoffice_orders::application::repository::OrderRepository;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let tracer_provider = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting Box Office API server");

    // Create database connection pool and bring the schema up to date.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = PgKeyValueStore::new(pool);
    store.migrate().await?;

    // Build application state.
    let clock = Arc::new(SystemClock);
    let ids = Arc::new(UuidGenerator);
    let repository = OrderRepository::new(
        Arc::new(store),
        clock.clone(),
        ids.clone(),
        &config.ledger,
    );
    let app_state = AppState::new(repository, clock, ids);

    // Start server.
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app(app_state)).await?;

    if let Some(provider) = tracer_provider {
        provider
            .shutdown()
            .map_err(|e| AppError::Telemetry(e.to_string()))?;
    }
    Ok(())
}
