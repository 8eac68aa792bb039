//! `PostgreSQL` implementation of the `KeyValueStore` trait.
//!
//! All ledger tables share one `ledger_items` relation keyed by
//! `(table_name, partition_key, sort_key)`, with the item body in a JSONB
//! column. Each [`WriteBatch`] runs in a single transaction.

use async_trait::async_trait;
use boxoffice_core::error::DomainError;
use boxoffice_core::store::{Item, ItemKey, KeyValueStore, WriteBatch, WriteRequest};
use boxoffice_core::time::to_iso;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

const UPSERT_ITEM: &str = r"
INSERT INTO ledger_items (table_name, partition_key, sort_key, item)
VALUES ($1, $2, $3, $4)
ON CONFLICT (table_name, partition_key, sort_key) DO UPDATE SET item = EXCLUDED.item
";

const MERGE_ITEM: &str = r"
UPDATE ledger_items SET item = item || $4
WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3
";

const DELETE_ITEM: &str = r"
DELETE FROM ledger_items
WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3
";

/// PostgreSQL-backed key-value store.
#[derive(Debug, Clone)]
pub struct PgKeyValueStore {
    pool: PgPool,
}

impl PgKeyValueStore {
    /// Creates a new `PgKeyValueStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns the migrator error if a migration fails.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

fn storage_error(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("storage error: {err}"))
}

fn sort_key(key: &ItemKey) -> &str {
    key.sort.as_deref().unwrap_or("")
}

/// Escapes `LIKE` metacharacters so `prefix` matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn item_from_row(row: &PgRow) -> Result<Item, DomainError> {
    let value: Value = row.try_get("item").map_err(storage_error)?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DomainError::Infrastructure(format!(
            "stored item is not a JSON object: {other}"
        ))),
    }
}

async fn execute_request(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    request: &WriteRequest,
) -> Result<(), DomainError> {
    let (sql, key, body) = match request {
        WriteRequest::Put { key, item } => (UPSERT_ITEM, key, Some(item)),
        WriteRequest::Update { key, attributes } => (MERGE_ITEM, key, Some(attributes)),
        WriteRequest::Delete { key } => (DELETE_ITEM, key, None),
    };
    let mut query = sqlx::query(sql)
        .bind(table)
        .bind(key.partition.as_str())
        .bind(sort_key(key));
    if let Some(body) = body {
        query = query.bind(Value::Object(body.clone()));
    }
    query.execute(&mut **tx).await.map_err(storage_error)?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for PgKeyValueStore {
    #[instrument(skip_all, fields(requests = batch.len()))]
    async fn write_batch(&self, batch: &WriteBatch) -> Result<(), DomainError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(storage_error)?;
        for (table, requests) in batch.tables() {
            for request in requests {
                execute_request(&mut tx, table, request).await?;
            }
        }
        tx.commit().await.map_err(storage_error)
    }

    async fn get(&self, table: &str, key: &ItemKey) -> Result<Option<Item>, DomainError> {
        let row = sqlx::query(
            "SELECT item FROM ledger_items \
             WHERE table_name = $1 AND partition_key = $2 AND sort_key = $3",
        )
        .bind(table)
        .bind(key.partition.as_str())
        .bind(sort_key(key))
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;
        row.as_ref().map(item_from_row).transpose()
    }

    async fn query_partition(
        &self,
        table: &str,
        partition: &str,
        sort_prefix: Option<&str>,
    ) -> Result<Vec<Item>, DomainError> {
        let rows = sqlx::query(
            "SELECT item FROM ledger_items \
             WHERE table_name = $1 AND partition_key = $2 AND sort_key LIKE $3 \
             ORDER BY sort_key",
        )
        .bind(table)
        .bind(partition)
        .bind(like_prefix(sort_prefix.unwrap_or("")))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn query_index(
        &self,
        table: &str,
        attribute: &str,
        value: &str,
    ) -> Result<Vec<Item>, DomainError> {
        let rows = sqlx::query(
            "SELECT item FROM ledger_items \
             WHERE table_name = $1 AND item->>($2::text) = $3 \
             ORDER BY partition_key, sort_key",
        )
        .bind(table)
        .bind(attribute)
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter().map(item_from_row).collect()
    }

    async fn scan_time_range(
        &self,
        table: &str,
        attribute: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Item>, DomainError> {
        let rows = sqlx::query(
            "SELECT item FROM ledger_items \
             WHERE table_name = $1 AND item->>($2::text) BETWEEN $3 AND $4 \
             ORDER BY item->>($2::text), partition_key",
        )
        .bind(table)
        .bind(attribute)
        .bind(to_iso(&from))
        .bind(to_iso(&to))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;
        rows.iter().map(item_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_prefix_escapes_metacharacters() {
        assert_eq!(like_prefix("Proceed"), "Proceed%");
        assert_eq!(like_prefix("50%_off"), "50\\%\\_off%");
        assert_eq!(like_prefix(""), "%");
    }

    #[test]
    fn test_sort_key_defaults_to_empty_string() {
        assert_eq!(sort_key(&ItemKey::partition("order-1")), "");
        assert_eq!(sort_key(&ItemKey::composite("e-1", "CheckIn")), "CheckIn");
    }
}
