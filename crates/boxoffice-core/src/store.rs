//! Key-value store abstraction.
//!
//! The ledger is written against a managed NoSQL store: JSON items addressed
//! by a partition key and an optional sort key, atomic multi-table batches,
//! secondary lookups on top-level string attributes, and range scans over
//! ISO-8601 timestamp attributes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::DomainError;

/// A stored item: a JSON object.
pub type Item = Map<String, Value>;

/// Primary key of an item within a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    /// Partition key.
    pub partition: String,
    /// Sort key, for tables that have one.
    pub sort: Option<String>,
}

impl ItemKey {
    /// Key for a table without a sort key.
    #[must_use]
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: None,
        }
    }

    /// Key for a table with a sort key.
    #[must_use]
    pub fn composite(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: Some(sort.into()),
        }
    }
}

/// A single write against one table.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Replace the whole item stored under `key`.
    Put {
        /// Target key.
        key: ItemKey,
        /// Full item body.
        item: Item,
    },
    /// Remove the item stored under `key`, if any.
    Delete {
        /// Target key.
        key: ItemKey,
    },
    /// Set the given top-level attributes on an existing item. A missing
    /// item stays missing.
    Update {
        /// Target key.
        key: ItemKey,
        /// Attributes to set.
        attributes: Item,
    },
}

impl WriteRequest {
    /// Returns the key this request targets.
    #[must_use]
    pub fn key(&self) -> &ItemKey {
        match self {
            Self::Put { key, .. } | Self::Delete { key } | Self::Update { key, .. } => key,
        }
    }
}

/// A write request addressed to a named table.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    /// Target table name.
    pub table: String,
    /// The request.
    pub request: WriteRequest,
}

impl Write {
    /// A put of `item` under `key`. `null` members are stripped from the item.
    #[must_use]
    pub fn put(table: &str, key: ItemKey, item: Item) -> Self {
        Self {
            table: table.to_owned(),
            request: WriteRequest::Put {
                key,
                item: strip_nulls_in(item),
            },
        }
    }

    /// A delete of the item under `key`.
    #[must_use]
    pub fn delete(table: &str, key: ItemKey) -> Self {
        Self {
            table: table.to_owned(),
            request: WriteRequest::Delete { key },
        }
    }

    /// An attribute update under `key`. `null` members are stripped.
    #[must_use]
    pub fn update(table: &str, key: ItemKey, attributes: Item) -> Self {
        Self {
            table: table.to_owned(),
            request: WriteRequest::Update {
                key,
                attributes: strip_nulls_in(attributes),
            },
        }
    }
}

/// A set of writes grouped by target table, applied atomically by
/// [`KeyValueStore::write_batch`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    tables: BTreeMap<String, Vec<WriteRequest>>,
}

impl WriteBatch {
    /// Groups `writes` by table, preserving their relative order.
    #[must_use]
    pub fn from_writes(writes: impl IntoIterator<Item = Write>) -> Self {
        let mut batch = Self::default();
        for write in writes {
            batch.push(write);
        }
        batch
    }

    /// Adds one write to the batch.
    pub fn push(&mut self, write: Write) {
        self.tables
            .entry(write.table)
            .or_default()
            .push(write.request);
    }

    /// Total number of requests across all tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    /// Returns `true` if the batch holds no requests.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over `(table, requests)` pairs in table-name order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &[WriteRequest])> {
        self.tables.iter().map(|(t, r)| (t.as_str(), r.as_slice()))
    }
}

/// Splits `writes` into batches of at most `limit` requests each.
///
/// A `limit` of zero is treated as one.
#[must_use]
pub fn chunk_writes(writes: Vec<Write>, limit: usize) -> Vec<WriteBatch> {
    let limit = limit.max(1);
    let mut batches = Vec::with_capacity(writes.len().div_ceil(limit));
    let mut iter = writes.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(WriteBatch::from_writes(iter.by_ref().take(limit)));
    }
    batches
}

/// Recursively removes `null` members from objects, so absent optional fields
/// are omitted rather than stored as null.
#[must_use]
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_nulls_in(map)),
        Value::Array(values) => Value::Array(values.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

fn strip_nulls_in(map: Item) -> Item {
    map.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, strip_nulls(v)))
        .collect()
}

/// Converts a serializable record into a store item.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the record does not serialize to
/// a JSON object.
pub fn to_item<T: serde::Serialize>(record: &T) -> Result<Item, DomainError> {
    match strip_nulls(serde_json::to_value(record)?) {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::Infrastructure(format!(
            "expected a JSON object for a store item, got {other}"
        ))),
    }
}

/// Converts a store item back into a record.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the item does not match `T`.
pub fn from_item<T: serde::de::DeserializeOwned>(item: Item) -> Result<T, DomainError> {
    serde_json::from_value(Value::Object(item)).map_err(|e| {
        DomainError::Infrastructure(format!("record deserialization failed: {e}"))
    })
}

/// Capability interface over the managed key-value store.
///
/// Implementations must apply each [`WriteBatch`] atomically and must never
/// retry internally; failures surface as `DomainError::Infrastructure`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Applies every request in `batch` atomically.
    async fn write_batch(&self, batch: &WriteBatch) -> Result<(), DomainError>;

    /// Point read by primary key.
    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, DomainError>;

    /// All items in `partition`, optionally restricted to sort keys starting
    /// with `sort_prefix`, ordered by sort key.
    async fn query_partition(
        &self,
        table: &str,
        partition: &str,
        sort_prefix: Option<&str>,
    ) -> Result<Vec<Item>, DomainError>;

    /// All items whose top-level string `attribute` equals `value`.
    async fn query_index(
        &self,
        table: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<Item>, DomainError>;

    /// All items whose ISO-8601 `attribute` lies in `[from, to]`.
    async fn scan_time_range(
        &self,
        table: &str,
        attribute: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Item>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_strip_nulls_removes_nested_null_members() {
        let value = json!({
            "id": "order-1",
            "promoCode": null,
            "customer": {"email": "a@b.c", "nickname": null},
            "items": [{"id": "i-1", "note": null}]
        });

        let stripped = strip_nulls(value);

        assert_eq!(
            stripped,
            json!({
                "id": "order-1",
                "customer": {"email": "a@b.c"},
                "items": [{"id": "i-1"}]
            })
        );
    }

    #[test]
    fn test_put_strips_null_attributes() {
        let write = Write::put(
            "orders",
            ItemKey::partition("order-1"),
            item(json!({"id": "order-1", "promoCode": null})),
        );

        match write.request {
            WriteRequest::Put { item, .. } => {
                assert!(!item.contains_key("promoCode"));
                assert_eq!(item["id"], "order-1");
            }
            other => panic!("expected Put, got {other:?}"),
        }
    }

    #[test]
    fn test_write_batch_groups_by_table() {
        let batch = WriteBatch::from_writes([
            Write::delete("orders", ItemKey::partition("a")),
            Write::delete("events", ItemKey::composite("e", "CheckIn")),
            Write::delete("orders", ItemKey::partition("b")),
        ]);

        let tables: Vec<(&str, usize)> = batch.tables().map(|(t, r)| (t, r.len())).collect();
        assert_eq!(tables, vec![("events", 1), ("orders", 2)]);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_chunk_writes_respects_limit() {
        let writes: Vec<Write> = (0..60)
            .map(|i| Write::delete("orders", ItemKey::partition(i.to_string())))
            .collect();

        let chunks = chunk_writes(writes, 25);

        let sizes: Vec<usize> = chunks.iter().map(WriteBatch::len).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
    }

    #[test]
    fn test_chunk_writes_of_nothing_is_empty() {
        assert!(chunk_writes(Vec::new(), 25).is_empty());
    }

    #[test]
    fn test_to_item_rejects_non_objects() {
        let result = to_item(&"just a string");

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
