//! Ledger configuration, built once at process start and passed to the
//! event store and repository constructors.

/// Default per-request item limit of the managed store.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Names of the tables the ledger reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Append-only event log.
    pub events: String,
    /// Order projection.
    pub orders: String,
    /// Payment projection.
    pub payments: String,
    /// Import fingerprint to order id.
    pub import_orders: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            events: "events".to_owned(),
            orders: "orders".to_owned(),
            payments: "payments".to_owned(),
            import_orders: "import_orders".to_owned(),
        }
    }
}

/// Configuration shared by the event store, repository and migrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Table names.
    pub tables: TableNames,
    /// Maximum number of write requests per store batch.
    pub batch_size: usize,
    /// Delete legacy event records once their replacements are written.
    pub delete_legacy_after_migration: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            tables: TableNames::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            delete_legacy_after_migration: false,
        }
    }
}
