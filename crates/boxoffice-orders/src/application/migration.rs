//! Upgrades legacy events to the current schema generation.
//!
//! A run loads every event in a time range, rewrites first-generation
//! events into current ones (keeping their id and time), appends the
//! rewrites, optionally deletes the legacy records, and finally replays the
//! whole upgraded stream so the projections reflect it. All rewriting
//! happens before the first write, so a run that cannot resolve an order
//! leaves the store untouched.

use std::collections::HashMap;
use std::sync::Arc;

use boxoffice_core::error::DomainError;
use boxoffice_core::id::IdGenerator;
use boxoffice_core::store::ItemKey;
use boxoffice_event_store::event_store::EventStore;
use serde::Serialize;
use tracing::{debug, info, instrument};

use super::projections::{ORDER_ID_INDEX, ProjectionReader};
use crate::domain::commands::EventRange;
use crate::domain::events::{
    CURRENT_SCHEMA_VERSION, OrderEvent, OrderEventKind, ProceedToCheckoutV2,
    UpdatePaymentStatusV2,
};
use crate::domain::legacy::PaymentOutcome;
use crate::domain::order::Order;
use crate::domain::payment::{Payment, PaymentStatus};

/// Counts from one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Events loaded from the range.
    pub scanned: usize,
    /// Legacy events rewritten into the current generation.
    pub transformed: usize,
    /// Events replayed as they are.
    pub passed_through: usize,
    /// Legacy events skipped because their rewrite already exists.
    pub already_migrated: usize,
    /// Legacy records deleted.
    pub deleted: usize,
}

/// Order and payment state as of the event being migrated.
#[derive(Debug, Default)]
struct ResolvedState {
    orders: HashMap<String, Order>,
    payments: HashMap<String, Vec<Payment>>,
}

impl ResolvedState {
    fn apply(&mut self, kind: &OrderEventKind) -> Result<(), DomainError> {
        match kind {
            OrderEventKind::CreateOrder(_)
            | OrderEventKind::SuccessfulPayment(_)
            | OrderEventKind::FailurePayment(_) => {}
            OrderEventKind::ProceedToCheckout(event) => {
                self.apply_checkout(&ProceedToCheckoutV2::from(event.clone()));
            }
            OrderEventKind::UpdatePaymentStatus(event) => {
                self.apply_status(&UpdatePaymentStatusV2::try_from(event.clone())?);
            }
            OrderEventKind::ProceedToCheckoutV2(checkout) => self.apply_checkout(checkout),
            OrderEventKind::UpdatePaymentStatusV2(update) => self.apply_status(update),
            OrderEventKind::CheckIn(check_in) => {
                if let Some(order) = self.orders.get_mut(&check_in.order_id) {
                    order.checked_in = check_in.checked_in;
                }
            }
        }
        Ok(())
    }

    fn apply_checkout(&mut self, checkout: &ProceedToCheckoutV2) {
        self.orders
            .insert(checkout.order.id.clone(), checkout.order.clone());
        self.payments
            .insert(checkout.order.id.clone(), checkout.payments.clone());
    }

    fn apply_status(&mut self, update: &UpdatePaymentStatusV2) {
        self.orders
            .insert(update.order.id.clone(), update.order.clone());
        let payments = self.payments.entry(update.order.id.clone()).or_default();
        match payments.iter_mut().find(|p| p.id == update.payment.id) {
            Some(existing) => *existing = update.payment.clone(),
            None => payments.push(update.payment.clone()),
        }
    }
}

/// Rewrites legacy events and rebuilds projections from the upgraded log.
#[derive(Clone)]
pub struct Migrator {
    events: EventStore,
    reader: ProjectionReader,
    ids: Arc<dyn IdGenerator>,
    delete_legacy: bool,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("events", &self.events)
            .field("delete_legacy", &self.delete_legacy)
            .finish_non_exhaustive()
    }
}

impl Migrator {
    /// Creates a migrator. `delete_legacy` removes legacy records once their
    /// rewrites are stored.
    #[must_use]
    pub fn new(
        events: EventStore,
        reader: ProjectionReader,
        ids: Arc<dyn IdGenerator>,
        delete_legacy: bool,
    ) -> Self {
        Self {
            events,
            reader,
            ids,
            delete_legacy,
        }
    }

    /// Migrates every event in `range`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::PreconditionFailed` if a legacy payment outcome
    /// names an order (or payment) that cannot be resolved; nothing is
    /// written in that case. Returns `DomainError::Infrastructure` if
    /// loading, decoding or writing fails.
    #[instrument(skip(self), fields(from = %range.from, to = %range.to))]
    pub async fn run(&self, range: EventRange) -> Result<MigrationReport, DomainError> {
        let stored = self.events.load_range(range.from, range.to).await?;
        let mut report = MigrationReport {
            scanned: stored.len(),
            ..MigrationReport::default()
        };
        let decoded = stored
            .iter()
            .map(OrderEvent::from_stored)
            .collect::<Result<Vec<_>, _>>()?;
        let mut state = ResolvedState::default();
        let mut rewrites: Vec<OrderEvent> = Vec::new();
        let mut replay: Vec<OrderEvent> = Vec::new();
        let mut legacy_keys: Vec<ItemKey> = Vec::new();

        for (record, event) in stored.iter().zip(&decoded) {
            if !event.data.awaits_migration() {
                state.apply(&event.data)?;
                replay.push(event.clone());
                report.passed_through += 1;
                continue;
            }
            legacy_keys.push(record.key());
            if self.is_migrated(&event.id).await? {
                debug!(event_id = %event.id, name = event.name(), "already migrated");
                report.already_migrated += 1;
                continue;
            }
            let rewritten = OrderEvent::new(
                event.id.clone(),
                event.time,
                self.rewrite(&event.data, &state).await?,
            );
            debug!(
                event_id = %event.id,
                from = event.name(),
                to = rewritten.name(),
                "rewrote legacy event"
            );
            state.apply(&rewritten.data)?;
            rewrites.push(rewritten.clone());
            replay.push(rewritten);
            report.transformed += 1;
        }

        self.events.append(&rewrites).await?;
        if self.delete_legacy {
            self.events.delete(&legacy_keys).await?;
            report.deleted = legacy_keys.len();
        }
        replay.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        self.events.reproject(&replay).await?;

        info!(
            scanned = report.scanned,
            transformed = report.transformed,
            passed_through = report.passed_through,
            already_migrated = report.already_migrated,
            deleted = report.deleted,
            "migration complete"
        );
        Ok(report)
    }

    /// Whether a current-generation record already shares the legacy id.
    async fn is_migrated(&self, event_id: &str) -> Result<bool, DomainError> {
        Ok(self
            .events
            .load_event(event_id)
            .await?
            .iter()
            .any(|record| record.schema_version == Some(CURRENT_SCHEMA_VERSION)))
    }

    async fn rewrite(
        &self,
        legacy: &OrderEventKind,
        state: &ResolvedState,
    ) -> Result<OrderEventKind, DomainError> {
        match legacy {
            OrderEventKind::CreateOrder(create) => Ok(OrderEventKind::ProceedToCheckoutV2(
                create.clone().into_checkout(self.ids.generate()),
            )),
            OrderEventKind::SuccessfulPayment(outcome) => Ok(OrderEventKind::UpdatePaymentStatusV2(
                self.settle(outcome, PaymentStatus::Completed, state).await?,
            )),
            OrderEventKind::FailurePayment(outcome) => Ok(OrderEventKind::UpdatePaymentStatusV2(
                self.settle(outcome, PaymentStatus::Failed, state).await?,
            )),
            OrderEventKind::ProceedToCheckout(_)
            | OrderEventKind::UpdatePaymentStatus(_)
            | OrderEventKind::ProceedToCheckoutV2(_)
            | OrderEventKind::UpdatePaymentStatusV2(_)
            | OrderEventKind::CheckIn(_) => Ok(legacy.clone()),
        }
    }

    async fn settle(
        &self,
        outcome: &PaymentOutcome,
        status: PaymentStatus,
        state: &ResolvedState,
    ) -> Result<UpdatePaymentStatusV2, DomainError> {
        let order = match state.orders.get(&outcome.order_id) {
            Some(order) => order.clone(),
            None => self
                .reader
                .order(&outcome.order_id)
                .await?
                .ok_or_else(|| DomainError::order_not_found(&outcome.order_id))?,
        };
        let payments = match state.payments.get(&outcome.order_id) {
            Some(payments) => payments.clone(),
            None => {
                self.reader
                    .payments_where(ORDER_ID_INDEX, &outcome.order_id)
                    .await?
            }
        };
        let payment = outcome
            .payment_intent_id
            .as_deref()
            .and_then(|intent| payments.iter().find(|p| p.stripe_id() == Some(intent)))
            .or_else(|| payments.first())
            .ok_or_else(|| {
                DomainError::PreconditionFailed(format!(
                    "order {} has no payment to settle",
                    outcome.order_id
                ))
            })?;
        Ok(UpdatePaymentStatusV2 {
            order: order.with_payment_status(&payment.id, status),
            payment: payment.with_status(status),
        })
    }
}
