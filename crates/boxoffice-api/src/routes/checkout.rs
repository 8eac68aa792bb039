//! Checkout and bulk import.

use axum::extract::State;
use axum::{Json, Router, routing::post};
use boxoffice_core::error::DomainError;
use boxoffice_orders::application::repository::ImportOutcome;
use boxoffice_orders::domain::commands::Checkout;
use boxoffice_orders::domain::order::{Customer, Money, Order, OrderItem, OrderStatus};
use boxoffice_orders::domain::payment::{
    Frequency, InstallmentPayment, PaymentStructure, StripeCorrelation,
};
use boxoffice_orders::domain::promotion::Promotion;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

/// How the buyer pays.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentPlan {
    /// One charge for the whole total.
    #[default]
    Direct,
    /// `term` charges spaced by `frequency`, the first one due now.
    Installments {
        /// Spacing between due dates.
        frequency: Frequency,
        /// Number of charges.
        term: u32,
    },
}

/// Request body for POST /checkout.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    /// Ordered items.
    pub items: Vec<OrderItem>,
    /// Total before promotions.
    pub total: Money,
    /// Buyer.
    pub customer: Customer,
    /// Promotion to apply, if the buyer redeemed one.
    #[serde(default)]
    pub promotion: Option<Promotion>,
    /// Payment plan; direct when omitted.
    #[serde(default)]
    pub plan: PaymentPlan,
    /// Gateway payment intent created for the first charge.
    #[serde(default)]
    pub payment_intent: Option<StripeCorrelation>,
}

/// Request body for POST /checkout/import.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// Fully formed checkouts, one per imported row.
    pub checkouts: Vec<Checkout>,
}

/// Response body for POST /checkout/import.
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    /// One outcome per submitted checkout, in order.
    pub outcomes: Vec<ImportOutcome>,
}

impl CheckoutRequest {
    fn into_checkout(self, state: &AppState) -> Result<Checkout, DomainError> {
        let now = state.clock.now();
        let mut order = Order {
            id: state.ids.generate(),
            status: OrderStatus::Pending,
            date: now,
            items: self.items,
            total: self.total,
            customer: self.customer,
            promo_code: None,
            checked_in: false,
            payment_structures: Vec::new(),
        };
        if let Some(promotion) = &self.promotion {
            order = promotion.apply(&order)?;
        }
        let structure = match self.plan {
            PaymentPlan::Direct => PaymentStructure::direct(&order.total, state.ids.as_ref()),
            PaymentPlan::Installments { frequency, term } => PaymentStructure::Installment(
                InstallmentPayment::split(&order.total, frequency, term, now, state.ids.as_ref())?,
            ),
        };
        order.payment_structures = vec![structure];
        Ok(Checkout {
            order,
            payment_intent: self.payment_intent,
        })
    }
}

/// POST /checkout
#[instrument(skip(state, request), fields(email = %request.customer.email))]
async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Order>, ApiError> {
    let checkout = request.into_checkout(&state)?;

    info!(order_id = %checkout.order.id, "handling checkout");

    let order = state.repository.save_checkout(&checkout).await?;

    Ok(Json(order))
}

/// POST /checkout/import
#[instrument(skip_all, fields(checkouts = request.checkouts.len()))]
async fn import(
    State(state): State<AppState>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, ApiError> {
    let outcomes = state.repository.import_checkouts(&request.checkouts).await?;

    Ok(Json(ImportResponse { outcomes }))
}

/// Returns the router for checkout.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout))
        .route("/import", post(import))
}
