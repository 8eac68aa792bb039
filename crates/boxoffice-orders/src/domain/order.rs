//! Orders and their derived status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payment::{PaymentStatus, PaymentStructure};

/// An amount in minor units of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (`30000` USD is 300.00 USD).
    pub amount: i64,
    /// ISO currency code.
    pub currency: String,
}

impl Money {
    /// Creates a new amount.
    #[must_use]
    pub fn new(amount: i64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Catalogue item id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Ids of the items bundled with this one.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Number of units.
    pub amount: u32,
    /// Line total.
    pub total: Money,
}

/// Dance role of the ticket holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    Leader,
    Follower,
    Couple,
}

/// The person placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    pub fullname: String,
    #[serde(rename = "type")]
    pub kind: CustomerType,
}

/// Order status. Always derived from the payment structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    /// Nothing settled yet.
    Pending,
    /// Every structure fully completed.
    Paid,
    /// Every structure has its first payment completed.
    PartiallyPaid,
    /// Legacy status only read from first-generation data.
    PaidFailedUnknown,
}

/// A ticket order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    #[serde(with = "boxoffice_core::time::iso8601")]
    pub date: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub customer: Customer,
    #[serde(default)]
    pub promo_code: Option<String>,
    #[serde(default)]
    pub checked_in: bool,
    #[serde(default)]
    pub payment_structures: Vec<PaymentStructure>,
}

impl Order {
    /// Computes the status implied by the payment structures.
    ///
    /// `paid` when every structure is complete, `partially-paid` when every
    /// structure has its first payment completed, otherwise `pending`. An
    /// order without structures is `pending`.
    #[must_use]
    pub fn derive_status(&self) -> OrderStatus {
        let structures = &self.payment_structures;
        if structures.is_empty() {
            OrderStatus::Pending
        } else if structures.iter().all(PaymentStructure::is_complete) {
            OrderStatus::Paid
        } else if structures
            .iter()
            .all(PaymentStructure::first_payment_completed)
        {
            OrderStatus::PartiallyPaid
        } else {
            OrderStatus::Pending
        }
    }

    /// Returns a copy whose status is re-derived.
    #[must_use]
    pub fn with_derived_status(&self) -> Self {
        Self {
            status: self.derive_status(),
            ..self.clone()
        }
    }

    /// Returns a copy with the payment `payment_id` set to `status` in its
    /// structure and the order status re-derived.
    #[must_use]
    pub fn with_payment_status(&self, payment_id: &str, status: PaymentStatus) -> Self {
        let updated = Self {
            payment_structures: self
                .payment_structures
                .iter()
                .map(|s| s.with_payment_status(payment_id, status))
                .collect(),
            ..self.clone()
        };
        updated.with_derived_status()
    }

    /// Whether any structure holds the charge `payment_id`.
    #[must_use]
    pub fn has_payment(&self, payment_id: &str) -> bool {
        self.payment_structures
            .iter()
            .any(|s| s.payment_ids().contains(&payment_id))
    }

    /// Sum of all structure totals.
    #[must_use]
    pub fn structures_total(&self) -> i64 {
        self.payment_structures.iter().map(|s| s.total().amount).sum()
    }
}
