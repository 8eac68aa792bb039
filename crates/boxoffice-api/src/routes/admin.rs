//! Operator endpoints: projection replay and schema migration.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use boxoffice_orders::application::migration::MigrationReport;
use boxoffice_orders::application::repository::ReplayReport;
use boxoffice_orders::domain::commands::EventRange;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /replay and POST /migrate.
#[derive(Debug, Deserialize)]
pub struct RangeRequest {
    /// Inclusive start.
    pub from: chrono::DateTime<chrono::Utc>,
    /// Inclusive end.
    pub to: chrono::DateTime<chrono::Utc>,
}

impl RangeRequest {
    fn range(&self) -> Result<EventRange, ApiError> {
        Ok(EventRange::new(self.from, self.to)?)
    }
}

/// POST /replay
#[instrument(skip(state, request), fields(from = %request.from, to = %request.to))]
async fn replay(
    State(state): State<AppState>,
    Json(request): Json<RangeRequest>,
) -> Result<Json<ReplayReport>, ApiError> {
    info!("handling replay");

    let report = state.repository.replay_events(request.range()?).await?;

    Ok(Json(report))
}

/// POST /migrate
#[instrument(skip(state, request), fields(from = %request.from, to = %request.to))]
async fn migrate(
    State(state): State<AppState>,
    Json(request): Json<RangeRequest>,
) -> Result<Json<MigrationReport>, ApiError> {
    info!("handling migration");

    let report = state.repository.migrate_events(request.range()?).await?;

    Ok(Json(report))
}

/// Returns the router for admin operations.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/replay", post(replay))
        .route("/migrate", post(migrate))
}
