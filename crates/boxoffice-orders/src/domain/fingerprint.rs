//! Import fingerprints.
//!
//! A fingerprint identifies an imported checkout by what the buyer paid and
//! who they are, so re-importing the same spreadsheet row is detected even
//! though the order gets a fresh id.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::order::{Customer, Money, Order};

/// Dedup record mapping a fingerprint to the order it created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOrder {
    pub fingerprint: String,
    pub order_id: String,
}

/// Lowercase hex SHA-256 over the normalized total, currency, email,
/// fullname and promo code.
#[must_use]
pub fn fingerprint(total: &Money, customer: &Customer, promo_code: Option<&str>) -> String {
    let canonical = [
        total.amount.to_string(),
        total.currency.trim().to_uppercase(),
        normalize(&customer.email),
        normalize(&customer.fullname),
        normalize(promo_code.unwrap_or_default()),
    ]
    .join("|");
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{digest:x}")
}

/// Fingerprint of an order as it will be checked out.
#[must_use]
pub fn order_fingerprint(order: &Order) -> String {
    fingerprint(&order.total, &order.customer, order.promo_code.as_deref())
}

fn normalize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
