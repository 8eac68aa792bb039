//! Order, payment and import-order read models and the writes each event
//! produces for them.
//!
//! Rows are tagged with the schema generation they were written in. Only
//! current rows are decoded; anything older is rebuilt by replaying the
//! event log.

use std::sync::Arc;

use boxoffice_core::config::TableNames;
use boxoffice_core::error::DomainError;
use boxoffice_core::event::Projection;
use boxoffice_core::store::{Item, ItemKey, KeyValueStore, Write, from_item, to_item};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::events::{
    CURRENT_SCHEMA_VERSION, CheckIn, OrderEventKind, ProceedToCheckoutV2, UpdatePaymentStatusV2,
};
use crate::domain::fingerprint::ImportOrder;
use crate::domain::order::Order;
use crate::domain::payment::Payment;

/// Payment attribute holding the gateway payment intent id.
pub const STRIPE_ID_INDEX: &str = "stripeId";
/// Payment attribute holding the owning order id.
pub const ORDER_ID_INDEX: &str = "orderId";
/// Payment attribute holding the payment status.
pub const STATUS_INDEX: &str = "status";

/// Row of the orders table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub schema_version: u32,
    #[serde(flatten)]
    pub order: Order,
}

/// Row of the payments table. `stripeId` is lifted to the top level so the
/// store can index it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub schema_version: u32,
    #[serde(default)]
    pub stripe_id: Option<String>,
    #[serde(flatten)]
    pub payment: Payment,
}

/// Row of the import-orders table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOrderRecord {
    pub schema_version: u32,
    #[serde(flatten)]
    pub import: ImportOrder,
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            order: order.clone(),
        }
    }
}

impl From<&Payment> for PaymentRecord {
    fn from(payment: &Payment) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            stripe_id: payment.stripe_id().map(str::to_owned),
            payment: payment.clone(),
        }
    }
}

/// Key of an order row.
#[must_use]
pub fn order_key(order_id: &str) -> ItemKey {
    ItemKey::partition(order_id)
}

/// Key of a payment row.
#[must_use]
pub fn payment_key(payment_id: &str) -> ItemKey {
    ItemKey::partition(payment_id)
}

/// Key of an import-order row.
#[must_use]
pub fn import_order_key(fingerprint: &str) -> ItemKey {
    ItemKey::partition(fingerprint)
}

fn order_write(order: &Order, tables: &TableNames) -> Result<Write, DomainError> {
    Ok(Write::put(
        &tables.orders,
        order_key(&order.id),
        to_item(&OrderRecord::from(order))?,
    ))
}

fn payment_write(payment: &Payment, tables: &TableNames) -> Result<Write, DomainError> {
    Ok(Write::put(
        &tables.payments,
        payment_key(&payment.id),
        to_item(&PaymentRecord::from(payment))?,
    ))
}

/// Writes of a checkout: the order row, one row per payment and, for
/// imports, the fingerprint record.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a record fails to serialize.
pub fn checkout_writes(
    checkout: &ProceedToCheckoutV2,
    tables: &TableNames,
) -> Result<Vec<Write>, DomainError> {
    let mut writes = vec![order_write(&checkout.order, tables)?];
    for payment in &checkout.payments {
        writes.push(payment_write(payment, tables)?);
    }
    if let Some(fingerprint) = &checkout.fingerprint {
        let record = ImportOrderRecord {
            schema_version: CURRENT_SCHEMA_VERSION,
            import: ImportOrder {
                fingerprint: fingerprint.clone(),
                order_id: checkout.order.id.clone(),
            },
        };
        writes.push(Write::put(
            &tables.import_orders,
            import_order_key(fingerprint),
            to_item(&record)?,
        ));
    }
    Ok(writes)
}

/// Writes of a payment status change: the order snapshot and the payment.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a record fails to serialize.
pub fn payment_status_writes(
    update: &UpdatePaymentStatusV2,
    tables: &TableNames,
) -> Result<Vec<Write>, DomainError> {
    Ok(vec![
        order_write(&update.order, tables)?,
        payment_write(&update.payment, tables)?,
    ])
}

/// Writes of a check-in: an attribute update of the order's flag. A missing
/// order row stays missing.
#[must_use]
pub fn check_in_writes(check_in: &CheckIn, tables: &TableNames) -> Vec<Write> {
    let mut attributes = Item::new();
    attributes.insert("checkedIn".to_owned(), Value::Bool(check_in.checked_in));
    vec![Write::update(
        &tables.orders,
        order_key(&check_in.order_id),
        attributes,
    )]
}

impl Projection for OrderEventKind {
    fn projection_writes(&self, tables: &TableNames) -> Result<Vec<Write>, DomainError> {
        match self {
            // First-generation events carry no payment structures; they
            // only project once migrated.
            Self::CreateOrder(_) | Self::SuccessfulPayment(_) | Self::FailurePayment(_) => {
                Ok(Vec::new())
            }
            Self::ProceedToCheckout(event) => {
                checkout_writes(&ProceedToCheckoutV2::from(event.clone()), tables)
            }
            Self::UpdatePaymentStatus(event) => payment_status_writes(
                &UpdatePaymentStatusV2::try_from(event.clone())?,
                tables,
            ),
            Self::ProceedToCheckoutV2(checkout) => checkout_writes(checkout, tables),
            Self::UpdatePaymentStatusV2(update) => payment_status_writes(update, tables),
            Self::CheckIn(check_in) => Ok(check_in_writes(check_in, tables)),
        }
    }
}

fn check_row_version(kind: &str, key: &str, found: u32) -> Result<(), DomainError> {
    if found == CURRENT_SCHEMA_VERSION {
        Ok(())
    } else {
        Err(DomainError::Infrastructure(format!(
            "{kind} row {key} is schema v{found}, expected v{CURRENT_SCHEMA_VERSION}; replay events to rebuild it"
        )))
    }
}

/// Decodes an order row.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the row is malformed or not at
/// the current schema version.
pub fn decode_order(item: Item) -> Result<Order, DomainError> {
    let record: OrderRecord = from_item(item)?;
    check_row_version("order", &record.order.id, record.schema_version)?;
    Ok(record.order)
}

/// Decodes a payment row.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the row is malformed or not at
/// the current schema version.
pub fn decode_payment(item: Item) -> Result<Payment, DomainError> {
    let record: PaymentRecord = from_item(item)?;
    check_row_version("payment", &record.payment.id, record.schema_version)?;
    Ok(record.payment)
}

/// Decodes an import-order row.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the row is malformed or not at
/// the current schema version.
pub fn decode_import_order(item: Item) -> Result<ImportOrder, DomainError> {
    let record: ImportOrderRecord = from_item(item)?;
    check_row_version("import order", &record.import.fingerprint, record.schema_version)?;
    Ok(record.import)
}

/// Point and index reads over the projection tables.
#[derive(Clone)]
pub struct ProjectionReader {
    store: Arc<dyn KeyValueStore>,
    tables: TableNames,
}

impl std::fmt::Debug for ProjectionReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionReader")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

impl ProjectionReader {
    /// Creates a reader over `tables`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, tables: TableNames) -> Self {
        Self { store, tables }
    }

    /// Reads an order row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the read or decoding fails.
    pub async fn order(&self, order_id: &str) -> Result<Option<Order>, DomainError> {
        self.store
            .get(&self.tables.orders, &order_key(order_id))
            .await?
            .map(decode_order)
            .transpose()
    }

    /// Reads a payment row.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the read or decoding fails.
    pub async fn payment(&self, payment_id: &str) -> Result<Option<Payment>, DomainError> {
        self.store
            .get(&self.tables.payments, &payment_key(payment_id))
            .await?
            .map(decode_payment)
            .transpose()
    }

    /// Payments whose indexed `attribute` equals `value`, ordered by due
    /// date and then id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query or decoding fails.
    pub async fn payments_where(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<Payment>, DomainError> {
        let mut payments = self
            .store
            .query_index(&self.tables.payments, attribute, value)
            .await?
            .into_iter()
            .map(decode_payment)
            .collect::<Result<Vec<_>, _>>()?;
        payments.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.id.cmp(&b.id)));
        Ok(payments)
    }

    /// Reads an import dedup record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the read or decoding fails.
    pub async fn import_order(&self, fingerprint: &str) -> Result<Option<ImportOrder>, DomainError> {
        self.store
            .get(&self.tables.import_orders, &import_order_key(fingerprint))
            .await?
            .map(decode_import_order)
            .transpose()
    }
}
