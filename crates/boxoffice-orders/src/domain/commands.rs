//! Inputs to the repository use cases.

use boxoffice_core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::Order;
use super::payment::{PaymentStatus, StripeCorrelation};

/// A checkout to persist: the order with its payment structures and the
/// gateway payment intent created for its first charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkout {
    pub order: Order,
    #[serde(default)]
    pub payment_intent: Option<StripeCorrelation>,
}

/// How a status update names its payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentSelector {
    /// By ledger payment id.
    Id(String),
    /// By gateway payment intent id.
    StripeId(String),
}

impl std::fmt::Display for PaymentSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "payment {id}"),
            Self::StripeId(id) => write!(f, "payment with stripe id {id}"),
        }
    }
}

/// A payment status change reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdate {
    pub order_id: String,
    pub payment: PaymentSelector,
    pub status: PaymentStatus,
}

/// Inclusive time range of events to replay or migrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRange {
    #[serde(with = "boxoffice_core::time::iso8601")]
    pub from: DateTime<Utc>,
    #[serde(with = "boxoffice_core::time::iso8601")]
    pub to: DateTime<Utc>,
}

impl EventRange {
    /// Creates a range, rejecting `from` after `to`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the range is inverted.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, DomainError> {
        if from > to {
            return Err(DomainError::Validation(format!(
                "invalid event range: {from} is after {to}"
            )));
        }
        Ok(Self { from, to })
    }
}
