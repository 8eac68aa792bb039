//! Promotions applied to an order before checkout.

use boxoffice_core::error::DomainError;
use serde::{Deserialize, Serialize};

use super::order::{Money, Order, OrderItem};

/// What a promotion does to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PromotionKind {
    /// Reduce the total by a percentage (0 to 100).
    #[serde(rename_all = "camelCase")]
    PercentOff { percent: u8 },
    /// Reduce the total by a fixed amount in minor units.
    #[serde(rename_all = "camelCase")]
    AmountOff { amount: i64 },
    /// Add a free item to the order.
    #[serde(rename_all = "camelCase")]
    GiveAway { item: OrderItem },
}

/// A redeemable promotion code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub code: String,
    pub kind: PromotionKind,
}

impl Promotion {
    /// Returns a copy of `order` with this promotion applied.
    ///
    /// The promo code is recorded on the order. Discounts never take the
    /// total below zero; a give-away is appended as a zero-priced item.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if an amount-off discount is
    /// negative.
    pub fn apply(&self, order: &Order) -> Result<Order, DomainError> {
        let mut applied = order.clone();
        applied.promo_code = Some(self.code.clone());
        match &self.kind {
            PromotionKind::PercentOff { percent } => {
                let total = i128::from(order.total.amount);
                let discount = total * i128::from((*percent).min(100)) / 100;
                applied.total.amount = i64::try_from((total - discount).max(0))
                    .map_err(|_| {
                        DomainError::Validation(format!(
                            "promotion {} overflows the order total",
                            self.code
                        ))
                    })?;
            }
            PromotionKind::AmountOff { amount } => {
                if *amount < 0 {
                    return Err(DomainError::Validation(format!(
                        "promotion {} has a negative discount of {amount}",
                        self.code
                    )));
                }
                applied.total.amount = order.total.amount.saturating_sub(*amount).max(0);
            }
            PromotionKind::GiveAway { item } => {
                applied.items.push(OrderItem {
                    total: Money::new(0, order.total.currency.clone()),
                    ..item.clone()
                });
            }
        }
        Ok(applied)
    }
}
