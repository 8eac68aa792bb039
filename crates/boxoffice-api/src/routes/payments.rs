//! Payment reads and the gateway status webhook.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use boxoffice_orders::domain::commands::PaymentStatusUpdate;
use boxoffice_orders::domain::payment::Payment;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// Query string of GET /pending.
#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    /// Cutoff (exclusive); defaults to now.
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
}

/// POST /status
#[instrument(skip(state, update), fields(order_id = %update.order_id, payment = %update.payment))]
async fn update_status(
    State(state): State<AppState>,
    Json(update): Json<PaymentStatusUpdate>,
) -> Result<Json<Payment>, ApiError> {
    info!(status = ?update.status, "handling payment status update");

    let payment = state.repository.save_payment_status(&update).await?;

    Ok(Json(payment))
}

/// GET /{id}
async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    state
        .repository
        .get_payment_by_id(&payment_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("payment {payment_id} not found")))
}

/// GET /stripe/{stripe_id}
async fn get_payment_by_stripe_id(
    State(state): State<AppState>,
    Path(stripe_id): Path<String>,
) -> Result<Json<Payment>, ApiError> {
    state
        .repository
        .get_payment_by_stripe_id(&stripe_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("payment with stripe id {stripe_id} not found")))
}

/// GET /pending
async fn pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let before = query.before.unwrap_or_else(|| state.clock.now());
    Ok(Json(state.repository.get_pending_payments(before).await?))
}

/// Returns the router for payments.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", post(update_status))
        .route("/pending", get(pending))
        .route("/stripe/{stripe_id}", get(get_payment_by_stripe_id))
        .route("/{id}", get(get_payment))
}
