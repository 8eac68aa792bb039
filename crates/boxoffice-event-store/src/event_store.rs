//! Append-and-project event store.
//!
//! Every event is persisted together with the projection writes it produces.
//! The envelope and its writes form one batch, split only at the store's
//! per-request item limit. Chunks of independent events are dispatched
//! concurrently; replay paths run events one after another so later events
//! win deterministically.

use std::sync::Arc;

use boxoffice_core::config::{LedgerConfig, TableNames};
use boxoffice_core::error::DomainError;
use boxoffice_core::event::{Event, EventData, Projection, StoredEvent};
use boxoffice_core::store::{
    ItemKey, KeyValueStore, Write, WriteBatch, chunk_writes, from_item, to_item,
};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use tracing::{debug, instrument};

/// Attribute of event records that range scans use.
pub const TIME_ATTRIBUTE: &str = "time";

/// Event store writing through a [`KeyValueStore`].
#[derive(Clone)]
pub struct EventStore {
    store: Arc<dyn KeyValueStore>,
    tables: TableNames,
    batch_size: usize,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("tables", &self.tables)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl EventStore {
    /// Creates a new `EventStore`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            tables: config.tables.clone(),
            batch_size: config.batch_size,
        }
    }

    /// Table names this store writes to.
    #[must_use]
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Appends each event together with its projection writes.
    ///
    /// Each event's writes are grouped by table and chunked to the batch
    /// limit; all chunks are dispatched concurrently. The first failure is
    /// returned as-is, without retry.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization or any batch
    /// write fails.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn process<T: Projection>(&self, events: &[Event<T>]) -> Result<(), DomainError> {
        let mut batches = Vec::new();
        for event in events {
            let mut writes = vec![self.envelope_write(&event.to_stored()?)?];
            writes.extend(event.data.projection_writes(&self.tables)?);
            debug!(event_id = %event.id, name = event.name(), writes = writes.len(), "processing event");
            batches.extend(chunk_writes(writes, self.batch_size));
        }
        self.dispatch(batches).await
    }

    /// Persists event envelopes only, without projection writes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization or any batch
    /// write fails.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn append<T: EventData>(&self, events: &[Event<T>]) -> Result<(), DomainError> {
        let writes = events
            .iter()
            .map(|event| self.envelope_write(&event.to_stored()?))
            .collect::<Result<Vec<_>, DomainError>>()?;
        self.dispatch(chunk_writes(writes, self.batch_size)).await
    }

    /// Re-runs projection writes for `events` in the given order without
    /// touching the event log.
    ///
    /// Events are applied one after another; only the chunks of a single
    /// event run concurrently.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` on the first failed write.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn reproject<T: Projection>(&self, events: &[Event<T>]) -> Result<(), DomainError> {
        for event in events {
            let writes = event.data.projection_writes(&self.tables)?;
            self.dispatch(chunk_writes(writes, self.batch_size)).await?;
        }
        Ok(())
    }

    /// Loads every stored event with `time` in `[from, to]`, ordered by time
    /// and then id. Ids break ties between events of one instant, so they
    /// must sort in creation order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `from` is after `to`, or
    /// `DomainError::Infrastructure` if the scan or decoding fails.
    #[instrument(skip(self))]
    pub async fn load_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        if from > to {
            return Err(DomainError::Validation(format!(
                "invalid event range: {from} is after {to}"
            )));
        }
        let items = self
            .store
            .scan_time_range(&self.tables.events, TIME_ATTRIBUTE, from, to)
            .await?;
        let mut events = items
            .into_iter()
            .map(from_item::<StoredEvent>)
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));
        debug!(count = events.len(), "loaded event range");
        Ok(events)
    }

    /// Loads every record stored under event `id`. A migrated event has one
    /// record per generation it was written in, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query or decoding fails.
    pub async fn load_event(&self, id: &str) -> Result<Vec<StoredEvent>, DomainError> {
        self.store
            .query_partition(&self.tables.events, id, None)
            .await?
            .into_iter()
            .map(from_item::<StoredEvent>)
            .collect()
    }

    /// Deletes event envelope records.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if any batch write fails.
    #[instrument(skip_all, fields(keys = keys.len()))]
    pub async fn delete(&self, keys: &[ItemKey]) -> Result<(), DomainError> {
        let writes = keys
            .iter()
            .map(|key| Write::delete(&self.tables.events, key.clone()))
            .collect();
        self.dispatch(chunk_writes(writes, self.batch_size)).await
    }

    fn envelope_write(&self, stored: &StoredEvent) -> Result<Write, DomainError> {
        Ok(Write::put(&self.tables.events, stored.key(), to_item(stored)?))
    }

    async fn dispatch(&self, batches: Vec<WriteBatch>) -> Result<(), DomainError> {
        if batches.is_empty() {
            return Ok(());
        }
        debug!(batches = batches.len(), "dispatching write batches");
        try_join_all(batches.iter().map(|batch| self.store.write_batch(batch))).await?;
        Ok(())
    }
}
