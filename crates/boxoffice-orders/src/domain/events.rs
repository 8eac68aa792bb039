//! Order ledger events across all three schema generations.

use boxoffice_core::error::DomainError;
use boxoffice_core::event::{Event, EventData, check_schema_version};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::legacy::{CreateOrder, PaymentOutcome, ProceedToCheckout, UpdatePaymentStatus};
use super::order::Order;
use super::payment::Payment;

pub const CREATE_ORDER: &str = "CreateOrder";
pub const SUCCESSFUL_PAYMENT: &str = "SuccessfulPayment";
pub const FAILURE_PAYMENT: &str = "FailurePayment";
pub const PROCEED_TO_CHECKOUT: &str = "ProceedToCheckout";
pub const UPDATE_PAYMENT_STATUS: &str = "UpdatePaymentStatus";
pub const PROCEED_TO_CHECKOUT_V2: &str = "ProceedToCheckoutV2";
pub const UPDATE_PAYMENT_STATUS_V2: &str = "UpdatePaymentStatusV2";
pub const CHECK_IN: &str = "CheckIn";

/// Schema generation of the current event shapes.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// A checkout: the order, its payment rows and, for imports, the
/// fingerprint it was deduplicated under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProceedToCheckoutV2 {
    pub order: Order,
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

/// A payment changed status. Carries the updated order snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePaymentStatusV2 {
    pub order: Order,
    pub payment: Payment,
}

/// A guest was checked in (or the check-in was undone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    pub order_id: String,
    pub checked_in: bool,
}

/// Every event the ledger has ever written.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEventKind {
    CreateOrder(CreateOrder),
    SuccessfulPayment(PaymentOutcome),
    FailurePayment(PaymentOutcome),
    ProceedToCheckout(ProceedToCheckout),
    UpdatePaymentStatus(UpdatePaymentStatus),
    ProceedToCheckoutV2(ProceedToCheckoutV2),
    UpdatePaymentStatusV2(UpdatePaymentStatusV2),
    CheckIn(CheckIn),
}

/// An order ledger event.
pub type OrderEvent = Event<OrderEventKind>;

impl OrderEventKind {
    /// Whether this payload is first-generation. Such events project
    /// nothing until the migrator rewrites them.
    #[must_use]
    pub fn awaits_migration(&self) -> bool {
        self.schema_version() == 1
    }
}

fn decode<T: DeserializeOwned>(name: &str, data: Value) -> Result<T, DomainError> {
    serde_json::from_value(data)
        .map_err(|e| DomainError::Infrastructure(format!("malformed {name} payload: {e}")))
}

impl EventData for OrderEventKind {
    fn name(&self) -> &'static str {
        match self {
            Self::CreateOrder(_) => CREATE_ORDER,
            Self::SuccessfulPayment(_) => SUCCESSFUL_PAYMENT,
            Self::FailurePayment(_) => FAILURE_PAYMENT,
            Self::ProceedToCheckout(_) => PROCEED_TO_CHECKOUT,
            Self::UpdatePaymentStatus(_) => UPDATE_PAYMENT_STATUS,
            Self::ProceedToCheckoutV2(_) => PROCEED_TO_CHECKOUT_V2,
            Self::UpdatePaymentStatusV2(_) => UPDATE_PAYMENT_STATUS_V2,
            Self::CheckIn(_) => CHECK_IN,
        }
    }

    fn schema_version(&self) -> u32 {
        match self {
            Self::CreateOrder(_) | Self::SuccessfulPayment(_) | Self::FailurePayment(_) => 1,
            Self::ProceedToCheckout(_) | Self::UpdatePaymentStatus(_) => 2,
            Self::ProceedToCheckoutV2(_) | Self::UpdatePaymentStatusV2(_) | Self::CheckIn(_) => {
                CURRENT_SCHEMA_VERSION
            }
        }
    }

    fn to_data(&self) -> Result<Value, DomainError> {
        let value = match self {
            Self::CreateOrder(data) => serde_json::to_value(data)?,
            Self::SuccessfulPayment(data) | Self::FailurePayment(data) => {
                serde_json::to_value(data)?
            }
            Self::ProceedToCheckout(data) => serde_json::to_value(data)?,
            Self::UpdatePaymentStatus(data) => serde_json::to_value(data)?,
            Self::ProceedToCheckoutV2(data) => serde_json::to_value(data)?,
            Self::UpdatePaymentStatusV2(data) => serde_json::to_value(data)?,
            Self::CheckIn(data) => serde_json::to_value(data)?,
        };
        Ok(value)
    }

    fn from_data(name: &str, schema_version: Option<u32>, data: Value) -> Result<Self, DomainError> {
        let event = match name {
            CREATE_ORDER => Self::CreateOrder(decode(name, data)?),
            SUCCESSFUL_PAYMENT => Self::SuccessfulPayment(decode(name, data)?),
            FAILURE_PAYMENT => Self::FailurePayment(decode(name, data)?),
            PROCEED_TO_CHECKOUT => Self::ProceedToCheckout(decode(name, data)?),
            UPDATE_PAYMENT_STATUS => Self::UpdatePaymentStatus(decode(name, data)?),
            PROCEED_TO_CHECKOUT_V2 => Self::ProceedToCheckoutV2(decode(name, data)?),
            UPDATE_PAYMENT_STATUS_V2 => Self::UpdatePaymentStatusV2(decode(name, data)?),
            CHECK_IN => Self::CheckIn(decode(name, data)?),
            other => {
                return Err(DomainError::Infrastructure(format!(
                    "unknown event name {other:?}"
                )));
            }
        };
        check_schema_version(name, event.schema_version(), schema_version)?;
        Ok(event)
    }
}
