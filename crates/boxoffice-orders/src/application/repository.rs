//! The order repository: the façade use cases persist and read through.
//!
//! Writes become events processed by the [`EventStore`]; reads go straight
//! to the projection tables.

use std::collections::HashMap;
use std::sync::Arc;

use boxoffice_core::config::LedgerConfig;
use boxoffice_core::error::DomainError;
use boxoffice_core::id::IdGenerator;
use boxoffice_core::store::KeyValueStore;
use boxoffice_core::time::Clock;
use boxoffice_event_store::event_store::EventStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use super::migration::{MigrationReport, Migrator};
use super::projections::{ORDER_ID_INDEX, ProjectionReader, STATUS_INDEX, STRIPE_ID_INDEX};
use crate::domain::commands::{Checkout, EventRange, PaymentSelector, PaymentStatusUpdate};
use crate::domain::events::{
    CheckIn, OrderEvent, OrderEventKind, ProceedToCheckoutV2, UpdatePaymentStatusV2,
};
use crate::domain::fingerprint::{ImportOrder, order_fingerprint};
use crate::domain::order::Order;
use crate::domain::payment::{Payment, PaymentStatus, derive_payments};

/// Counts from one replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    /// Events re-projected.
    pub replayed: usize,
    /// First-generation events in range; they project nothing until
    /// migrated.
    pub awaiting_migration: usize,
}

/// Result of importing one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ImportOutcome {
    /// A new order was saved.
    #[serde(rename_all = "camelCase")]
    Imported { order_id: String },
    /// The checkout was imported before, as `order_id`.
    #[serde(rename_all = "camelCase")]
    Duplicate { order_id: String },
}

/// Persists checkouts, payment changes and check-ins as events and reads
/// the resulting projections.
#[derive(Clone)]
pub struct OrderRepository {
    events: EventStore,
    reader: ProjectionReader,
    migrator: Migrator,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for OrderRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRepository")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl OrderRepository {
    /// Creates a repository over `store`.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        config: &LedgerConfig,
    ) -> Self {
        let events = EventStore::new(store.clone(), config);
        let reader = ProjectionReader::new(store, config.tables.clone());
        let migrator = Migrator::new(
            events.clone(),
            reader.clone(),
            ids.clone(),
            config.delete_legacy_after_migration,
        );
        Self {
            events,
            reader,
            migrator,
            clock,
            ids,
        }
    }

    fn event(&self, data: OrderEventKind) -> OrderEvent {
        OrderEvent::new(self.ids.generate(), self.clock.now(), data)
    }

    fn checkout_event(
        &self,
        checkout: &Checkout,
        fingerprint: Option<String>,
    ) -> Result<OrderEvent, DomainError> {
        let order = checkout.order.with_derived_status();
        if !order.payment_structures.is_empty() && order.structures_total() != order.total.amount {
            return Err(DomainError::Validation(format!(
                "payment structures of order {} sum to {} but the order total is {}",
                order.id,
                order.structures_total(),
                order.total.amount
            )));
        }
        let payments = derive_payments(
            &order.id,
            &order.payment_structures,
            checkout.payment_intent.as_ref(),
        );
        Ok(self.event(OrderEventKind::ProceedToCheckoutV2(ProceedToCheckoutV2 {
            order,
            payments,
            fingerprint,
        })))
    }

    /// Saves a checkout: the order, one payment per charge and the event
    /// recording both. Returns the order as persisted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the payment structures do not
    /// add up to the order total, or `DomainError::Infrastructure` if the
    /// write fails.
    #[instrument(skip(self, checkout), fields(order_id = %checkout.order.id))]
    pub async fn save_checkout(&self, checkout: &Checkout) -> Result<Order, DomainError> {
        let mut saved = self.save_checkouts(std::slice::from_ref(checkout)).await?;
        saved
            .pop()
            .ok_or_else(|| DomainError::Infrastructure("checkout was not saved".into()))
    }

    /// Saves several checkouts at once. Empty input writes nothing.
    ///
    /// # Errors
    ///
    /// Same as [`OrderRepository::save_checkout`]; nothing is written if any
    /// checkout fails validation.
    #[instrument(skip_all, fields(checkouts = checkouts.len()))]
    pub async fn save_checkouts(&self, checkouts: &[Checkout]) -> Result<Vec<Order>, DomainError> {
        let events = checkouts
            .iter()
            .map(|checkout| self.checkout_event(checkout, None))
            .collect::<Result<Vec<_>, _>>()?;
        self.events.process(&events).await?;
        info!(count = events.len(), "saved checkouts");
        Ok(events.into_iter().filter_map(checked_out_order).collect())
    }

    /// Imports checkouts, skipping any whose fingerprint was imported before
    /// or repeats earlier in the same input.
    ///
    /// # Errors
    ///
    /// Same as [`OrderRepository::save_checkout`].
    #[instrument(skip_all, fields(checkouts = checkouts.len()))]
    pub async fn import_checkouts(
        &self,
        checkouts: &[Checkout],
    ) -> Result<Vec<ImportOutcome>, DomainError> {
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut outcomes = Vec::with_capacity(checkouts.len());
        let mut events = Vec::new();
        for checkout in checkouts {
            let fingerprint = order_fingerprint(&checkout.order);
            if let Some(order_id) = seen.get(&fingerprint) {
                outcomes.push(ImportOutcome::Duplicate {
                    order_id: order_id.clone(),
                });
                continue;
            }
            if let Some(existing) = self.reader.import_order(&fingerprint).await? {
                outcomes.push(ImportOutcome::Duplicate {
                    order_id: existing.order_id,
                });
                continue;
            }
            seen.insert(fingerprint.clone(), checkout.order.id.clone());
            events.push(self.checkout_event(checkout, Some(fingerprint))?);
            outcomes.push(ImportOutcome::Imported {
                order_id: checkout.order.id.clone(),
            });
        }
        self.events.process(&events).await?;
        info!(
            imported = events.len(),
            duplicates = outcomes.len() - events.len(),
            "imported checkouts"
        );
        Ok(outcomes)
    }

    /// Records a payment status change reported by the gateway. Returns the
    /// updated payment.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if the order or payment
    /// cannot be resolved, or `DomainError::Infrastructure` if a read or the
    /// write fails.
    #[instrument(skip(self, update), fields(order_id = %update.order_id, status = ?update.status))]
    pub async fn save_payment_status(
        &self,
        update: &PaymentStatusUpdate,
    ) -> Result<Payment, DomainError> {
        let order = self
            .get_order_by_id(&update.order_id)
            .await?
            .ok_or_else(|| DomainError::order_not_found(&update.order_id))?;
        let payment = match &update.payment {
            PaymentSelector::Id(id) => self.get_payment_by_id(id).await?,
            PaymentSelector::StripeId(id) => self.get_payment_by_stripe_id(id).await?,
        }
        .filter(|payment| payment.order_id == order.id)
        .ok_or_else(|| {
            DomainError::PreconditionFailed(format!(
                "{} not found for order {}",
                update.payment, order.id
            ))
        })?;

        let updated = payment.with_status(update.status);
        let event = self.event(OrderEventKind::UpdatePaymentStatusV2(UpdatePaymentStatusV2 {
            order: order.with_payment_status(&payment.id, update.status),
            payment: updated.clone(),
        }));
        self.events.process(&[event]).await?;
        info!(payment_id = %updated.id, "saved payment status");
        Ok(updated)
    }

    /// Reads an order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the read or decoding fails.
    pub async fn get_order_by_id(&self, order_id: &str) -> Result<Option<Order>, DomainError> {
        self.reader.order(order_id).await
    }

    /// Reads a payment by its ledger id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the read or decoding fails.
    pub async fn get_payment_by_id(&self, payment_id: &str) -> Result<Option<Payment>, DomainError> {
        self.reader.payment(payment_id).await
    }

    /// Reads a payment by its gateway payment intent id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query or decoding fails.
    pub async fn get_payment_by_stripe_id(
        &self,
        stripe_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .reader
            .payments_where(STRIPE_ID_INDEX, stripe_id)
            .await?
            .into_iter()
            .next())
    }

    /// All payments of an order, by due date.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query or decoding fails.
    pub async fn get_payments_by_order(&self, order_id: &str) -> Result<Vec<Payment>, DomainError> {
        self.reader.payments_where(ORDER_ID_INDEX, order_id).await
    }

    /// Pending payments due strictly before `before`, by due date.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query or decoding fails.
    pub async fn get_pending_payments(
        &self,
        before: DateTime<Utc>,
    ) -> Result<Vec<Payment>, DomainError> {
        let mut pending = self
            .reader
            .payments_where(STATUS_INDEX, PaymentStatus::Pending.as_str())
            .await?;
        pending.retain(|payment| payment.due_date.is_some_and(|due| due < before));
        Ok(pending)
    }

    /// Reads the import record of a fingerprint.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the read or decoding fails.
    pub async fn get_import_order(
        &self,
        fingerprint: &str,
    ) -> Result<Option<ImportOrder>, DomainError> {
        self.reader.import_order(fingerprint).await
    }

    /// Sets or clears the check-in flag of an order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if the order does not exist,
    /// or `DomainError::Infrastructure` if a read or the write fails.
    #[instrument(skip(self))]
    pub async fn update_order_check_in(
        &self,
        order_id: &str,
        checked_in: bool,
    ) -> Result<(), DomainError> {
        if self.get_order_by_id(order_id).await?.is_none() {
            return Err(DomainError::order_not_found(order_id));
        }
        let event = self.event(OrderEventKind::CheckIn(CheckIn {
            order_id: order_id.to_owned(),
            checked_in,
        }));
        self.events.process(&[event]).await
    }

    /// Rebuilds projections from the events in `range`, oldest first. The
    /// event log itself is not modified.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if loading, decoding or a
    /// projection write fails.
    #[instrument(skip(self), fields(from = %range.from, to = %range.to))]
    pub async fn replay_events(&self, range: EventRange) -> Result<ReplayReport, DomainError> {
        let events = self
            .events
            .load_range(range.from, range.to)
            .await?
            .iter()
            .map(OrderEvent::from_stored)
            .collect::<Result<Vec<_>, _>>()?;
        self.events.reproject(&events).await?;
        let report = ReplayReport {
            replayed: events.len(),
            awaiting_migration: events
                .iter()
                .filter(|event| event.data.awaits_migration())
                .count(),
        };
        info!(
            replayed = report.replayed,
            awaiting_migration = report.awaiting_migration,
            "replayed events"
        );
        Ok(report)
    }

    /// Migrates legacy events in `range` and rebuilds projections.
    ///
    /// # Errors
    ///
    /// See [`Migrator::run`].
    pub async fn migrate_events(&self, range: EventRange) -> Result<MigrationReport, DomainError> {
        self.migrator.run(range).await
    }
}

fn checked_out_order(event: OrderEvent) -> Option<Order> {
    match event.data {
        OrderEventKind::ProceedToCheckoutV2(checkout) => Some(checkout.order),
        _ => None,
    }
}
