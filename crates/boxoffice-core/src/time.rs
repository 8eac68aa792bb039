//! Clock abstraction and the timestamp format used by persisted records.
//!
//! Every timestamp that reaches the store is written as ISO-8601 in UTC with
//! millisecond precision (`2026-01-15T10:00:00.000Z`). The fixed width keeps
//! lexicographic order equal to chronological order, which range scans over
//! string attributes depend on.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::DomainError;

/// Abstraction over system time for deterministic behavior.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Formats a timestamp the way it is persisted.
#[must_use]
pub fn to_iso(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a persisted ISO-8601 timestamp.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if `value` is not RFC 3339.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, DomainError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DomainError::Infrastructure(format!("invalid timestamp {value:?}: {e}")))
}

/// Serde adapter writing `DateTime<Utc>` in the persisted format.
///
/// Use with `#[serde(with = "boxoffice_core::time::iso8601")]`.
pub mod iso8601 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp as a fixed-width ISO-8601 string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_iso(time))
    }

    /// Deserializes an ISO-8601 string.
    ///
    /// # Errors
    ///
    /// Returns a custom error if the string is not RFC 3339.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_iso(&raw).map_err(serde::de::Error::custom)
    }

    /// The same adapter for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes an optional timestamp; `None` becomes `null`, which the
        /// store strips before writing.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&crate::time::to_iso(t)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional ISO-8601 string.
        ///
        /// # Errors
        ///
        /// Returns a custom error if a present string is not RFC 3339.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| crate::time::parse_iso(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
