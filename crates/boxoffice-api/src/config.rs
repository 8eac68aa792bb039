//! Server configuration, read once from the environment at startup.

use boxoffice_core::config::{DEFAULT_BATCH_SIZE, LedgerConfig, TableNames};

use crate::error::AppError;

/// Everything `main` needs to start the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// OTLP collector endpoint; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
    /// Ledger tables and batching.
    pub ledger: LedgerConfig,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".into())
        })?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000u16)?;
        let defaults = TableNames::default();
        let tables = TableNames {
            events: lookup("BOXOFFICE_EVENTS_TABLE").unwrap_or(defaults.events),
            orders: lookup("BOXOFFICE_ORDERS_TABLE").unwrap_or(defaults.orders),
            payments: lookup("BOXOFFICE_PAYMENTS_TABLE").unwrap_or(defaults.payments),
            import_orders: lookup("BOXOFFICE_IMPORT_ORDERS_TABLE")
                .unwrap_or(defaults.import_orders),
        };
        let batch_size = parse_or(&lookup, "BOXOFFICE_BATCH_SIZE", DEFAULT_BATCH_SIZE)?;
        if batch_size == 0 {
            return Err(AppError::Config(
                "BOXOFFICE_BATCH_SIZE must be at least 1".into(),
            ));
        }
        let delete_legacy_after_migration =
            parse_or(&lookup, "BOXOFFICE_DELETE_LEGACY_AFTER_MIGRATION", false)?;

        Ok(Self {
            database_url,
            host,
            port,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
            ledger: LedgerConfig {
                tables,
                batch_size,
                delete_legacy_after_migration,
            },
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid ({raw:?}): {e}"))),
        None => Ok(default),
    }
}
