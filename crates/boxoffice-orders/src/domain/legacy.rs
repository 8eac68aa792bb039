//! Payload shapes of the first two event generations.
//!
//! Generation 1 stored the whole order inline with the gateway payment
//! intent and had no payment structures; payment outcomes only referenced
//! the order. Generation 2 added payment structures but still embedded the
//! payment intent in the order. Both are read-only: nothing new is written
//! in these shapes.

use boxoffice_core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::{ProceedToCheckoutV2, UpdatePaymentStatusV2};
use super::order::{Customer, Money, Order, OrderItem, OrderStatus};
use super::payment::{
    DirectPayment, PaymentStatus, PaymentStructure, StripeCorrelation, derive_payments,
};

/// Generation 1 `CreateOrder` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
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
    pub payment_intent: Option<StripeCorrelation>,
}

impl CreateOrder {
    /// Status of the single direct payment implied by the legacy order
    /// status.
    #[must_use]
    pub fn payment_status(&self) -> PaymentStatus {
        match self.status {
            OrderStatus::Paid => PaymentStatus::Completed,
            OrderStatus::PaidFailedUnknown => PaymentStatus::Failed,
            OrderStatus::Pending | OrderStatus::PartiallyPaid => PaymentStatus::Pending,
        }
    }

    /// Rewrites the order as a current checkout with one direct payment over
    /// the order total, tracked under `payment_id`.
    ///
    /// The legacy order status is carried over verbatim so orders settled
    /// under the old gateway flow keep their recorded outcome.
    #[must_use]
    pub fn into_checkout(self, payment_id: String) -> ProceedToCheckoutV2 {
        let structure = PaymentStructure::Direct(DirectPayment {
            amount: self.total.amount,
            currency: self.total.currency.clone(),
            status: self.payment_status(),
            payment_id,
        });
        let order = Order {
            id: self.id,
            status: self.status,
            date: self.date,
            items: self.items,
            total: self.total,
            customer: self.customer,
            promo_code: self.promo_code,
            checked_in: false,
            payment_structures: vec![structure],
        };
        let payments = derive_payments(
            &order.id,
            &order.payment_structures,
            self.payment_intent.as_ref(),
        );
        ProceedToCheckoutV2 {
            order,
            payments,
            fingerprint: None,
        }
    }
}

/// Generation 1 `SuccessfulPayment` / `FailurePayment` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub order_id: String,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Generation 2 order: payment structures present, intent still embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderV2 {
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
    pub payment_intent: Option<StripeCorrelation>,
    #[serde(default)]
    pub payment_structures: Vec<PaymentStructure>,
}

impl From<OrderV2> for Order {
    fn from(order: OrderV2) -> Self {
        Self {
            id: order.id,
            status: order.status,
            date: order.date,
            items: order.items,
            total: order.total,
            customer: order.customer,
            promo_code: order.promo_code,
            checked_in: order.checked_in,
            payment_structures: order.payment_structures,
        }
    }
}

/// Generation 2 `ProceedToCheckout` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProceedToCheckout {
    pub order: OrderV2,
}

impl From<ProceedToCheckout> for ProceedToCheckoutV2 {
    fn from(event: ProceedToCheckout) -> Self {
        let intent = event.order.payment_intent.clone();
        let order = Order::from(event.order).with_derived_status();
        let payments = derive_payments(&order.id, &order.payment_structures, intent.as_ref());
        Self {
            order,
            payments,
            fingerprint: None,
        }
    }
}

/// Generation 2 `UpdatePaymentStatus` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentStatus {
    pub order: OrderV2,
    pub payment_id: String,
    pub status: PaymentStatus,
}

impl TryFrom<UpdatePaymentStatus> for UpdatePaymentStatusV2 {
    type Error = DomainError;

    fn try_from(event: UpdatePaymentStatus) -> Result<Self, Self::Error> {
        let intent = event.order.payment_intent.clone();
        let order = Order::from(event.order);
        let payment = derive_payments(&order.id, &order.payment_structures, intent.as_ref())
            .into_iter()
            .find(|p| p.id == event.payment_id)
            .ok_or_else(|| {
                DomainError::Infrastructure(format!(
                    "payment {} is not part of order {}",
                    event.payment_id, order.id
                ))
            })?
            .with_status(event.status);
        Ok(Self {
            order: order.with_payment_status(&event.payment_id, event.status),
            payment,
        })
    }
}
