//! Order reads and guest check-in.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use boxoffice_orders::domain::order::Order;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /{id}/check-in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    /// `false` undoes a check-in.
    #[serde(default = "checked_in_default")]
    pub checked_in: bool,
}

fn checked_in_default() -> bool {
    true
}

/// Response body for POST /{id}/check-in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    /// The order checked in.
    pub order_id: String,
    /// The flag as stored.
    pub checked_in: bool,
}

/// GET /{id}
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    state
        .repository
        .get_order_by_id(&order_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("order {order_id} not found")))
}

/// POST /{id}/check-in
#[instrument(skip(state, request))]
async fn check_in(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, ApiError> {
    info!(checked_in = request.checked_in, "handling check-in");

    state
        .repository
        .update_order_check_in(&order_id, request.checked_in)
        .await?;

    Ok(Json(CheckInResponse {
        order_id,
        checked_in: request.checked_in,
    }))
}

/// Returns the router for orders.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_order))
        .route("/{id}/check-in", post(check_in))
}
