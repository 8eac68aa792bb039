//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Absent records are not errors: reads return `Option` or an empty `Vec`
/// and callers decide how to react.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A record an update depends on could not be resolved.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Builds the error raised when an order cannot be resolved.
    #[must_use]
    pub fn order_not_found(order_id: &str) -> Self {
        Self::PreconditionFailed(format!("order {order_id} not found"))
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infrastructure(format!("serialization failed: {err}"))
    }
}
