//! Test stores — `KeyValueStore` implementations for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use boxoffice_core::error::DomainError;
use boxoffice_core::store::{Item, ItemKey, KeyValueStore, WriteBatch, WriteRequest};
use boxoffice_core::time::parse_iso;
use chrono::{DateTime, Utc};

type Tables = BTreeMap<String, BTreeMap<ItemKey, Item>>;

/// An in-memory store that applies each batch atomically under one lock and
/// records every batch it was asked to write.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    tables: Mutex<Tables>,
    batches: Mutex<Vec<WriteBatch>>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every item in `table`, ordered by key.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn table(&self, table: &str) -> BTreeMap<ItemKey, Item> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes an item directly, bypassing the batch log. Simulates a lost
    /// projection row.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn remove(&self, table: &str, key: &ItemKey) -> Option<Item> {
        self.tables
            .lock()
            .unwrap()
            .get_mut(table)
            .and_then(|rows| rows.remove(key))
    }

    /// Removes every item of `table`. Simulates a lost projection table.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_table(&self, table: &str) {
        self.tables.lock().unwrap().remove(table);
    }

    /// Inserts an item directly, bypassing the batch log. Used to seed legacy
    /// records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert(&self, table: &str, key: ItemKey, item: Item) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .insert(key, item);
    }

    /// Returns a snapshot of all batches written so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn batches(&self) -> Vec<WriteBatch> {
        self.batches.lock().unwrap().clone()
    }

    fn read<T>(&self, table: &str, f: impl FnOnce(&BTreeMap<ItemKey, Item>) -> T) -> T {
        let tables = self.tables.lock().unwrap();
        match tables.get(table) {
            Some(rows) => f(rows),
            None => f(&BTreeMap::new()),
        }
    }
}

fn apply(rows: &mut BTreeMap<ItemKey, Item>, request: &WriteRequest) {
    match request {
        WriteRequest::Put { key, item } => {
            rows.insert(key.clone(), item.clone());
        }
        WriteRequest::Delete { key } => {
            rows.remove(key);
        }
        WriteRequest::Update { key, attributes } => {
            if let Some(row) = rows.get_mut(key) {
                for (name, value) in attributes {
                    row.insert(name.clone(), value.clone());
                }
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn write_batch(&self, batch: &WriteBatch) -> Result<(), DomainError> {
        {
            let mut tables = self.tables.lock().unwrap();
            for (table, requests) in batch.tables() {
                let rows = tables.entry(table.to_owned()).or_default();
                for request in requests {
                    apply(rows, request);
                }
            }
        }
        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }

    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, DomainError> {
        Ok(self.read(table, |rows| rows.get(key).cloned()))
    }

    async fn query_partition(
        &self,
        table: &str,
        partition: &str,
        sort_prefix: Option<&str>,
    ) -> Result<Vec<Item>, DomainError> {
        Ok(self.read(table, |rows| {
            rows.iter()
                .filter(|(key, _)| key.partition == partition)
                .filter(|(key, _)| match (sort_prefix, &key.sort) {
                    (Some(prefix), Some(sort)) => sort.starts_with(prefix),
                    (Some(_), None) => false,
                    (None, _) => true,
                })
                .map(|(_, item)| item.clone())
                .collect()
        }))
    }

    async fn query_index(
        &self,
        table: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<Item>, DomainError> {
        Ok(self.read(table, |rows| {
            rows.values()
                .filter(|item| item.get(attribute).and_then(|v| v.as_str()) == Some(value))
                .cloned()
                .collect()
        }))
    }

    async fn scan_time_range(
        &self,
        table: &str,
        attribute: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Item>, DomainError> {
        let candidates = self.read(table, |rows| {
            rows.values()
                .filter_map(|item| {
                    let raw = item.get(attribute)?.as_str()?.to_owned();
                    Some((raw, item.clone()))
                })
                .collect::<Vec<_>>()
        });
        let mut matched = Vec::new();
        for (raw, item) in candidates {
            let time = parse_iso(&raw)?;
            if from <= time && time <= to {
                matched.push(item);
            }
        }
        Ok(matched)
    }
}

/// A store that always returns an infrastructure error. Useful for testing
/// error-propagation paths.
#[derive(Debug)]
pub struct FailingKeyValueStore;

fn refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl KeyValueStore for FailingKeyValueStore {
    async fn write_batch(&self, _batch: &WriteBatch) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn get(&self, _table: &str, _key: &ItemKey) -> Result<Option<Item>, DomainError> {
        Err(refused())
    }

    async fn query_partition(
        &self,
        _table: &str,
        _partition: &str,
        _sort_prefix: Option<&str>,
    ) -> Result<Vec<Item>, DomainError> {
        Err(refused())
    }

    async fn query_index(
        &self,
        _table: &str,
        _attribute: &str,
        _value: &str,
    ) -> Result<Vec<Item>, DomainError> {
        Err(refused())
    }

    async fn scan_time_range(
        &self,
        _table: &str,
        _attribute: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Item>, DomainError> {
        Err(refused())
    }
}
