//! Box Office — HTTP API over the order ledger.

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

/// Builds the full router. `main` and the integration tests share it.
pub fn app(app_state: state::AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with the storefront origins once they are fixed.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1/checkout", routes::checkout::router())
        .nest("/api/v1/orders", routes::orders::router())
        .nest("/api/v1/payments", routes::payments::router())
        .nest("/api/v1/admin", routes::admin::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
