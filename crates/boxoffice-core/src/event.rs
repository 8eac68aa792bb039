//! Event envelope and the traits event payloads implement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TableNames;
use crate::error::DomainError;
use crate::store::{ItemKey, Write};

/// An immutable record of something that happened.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<T> {
    /// Unique event identifier, never reused.
    pub id: String,
    /// When the event happened. Replay orders by this, not by `id`.
    pub time: DateTime<Utc>,
    /// Named payload; its type decides the event name.
    pub data: T,
}

/// Trait that all event payloads implement.
pub trait EventData: Send + Sync + std::fmt::Debug + Sized {
    /// The event name persisted alongside the payload.
    fn name(&self) -> &'static str;

    /// The schema generation this payload belongs to.
    fn schema_version(&self) -> u32;

    /// Serializes the payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    fn to_data(&self) -> Result<Value, DomainError>;

    /// Decodes a payload from its persisted name, schema tag and JSON body.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` for unknown names, mismatched
    /// schema tags or malformed bodies.
    fn from_data(name: &str, schema_version: Option<u32>, data: Value) -> Result<Self, DomainError>;
}

/// Payloads that know which projection writes they produce.
///
/// Implementations must be pure functions of the payload that only "set"
/// state, so applying the same event twice leaves the same end state.
pub trait Projection: EventData {
    /// Returns the projection writes for this payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a record fails to serialize.
    fn projection_writes(&self, tables: &TableNames) -> Result<Vec<Write>, DomainError>;
}

/// Persisted form of an event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    /// Unique event identifier.
    pub id: String,
    /// Event name for decoding.
    pub name: String,
    /// Event timestamp.
    #[serde(with = "crate::time::iso8601")]
    pub time: DateTime<Utc>,
    /// Schema generation tag. Absent on records written before tagging.
    #[serde(default)]
    pub schema_version: Option<u32>,
    /// Serialized payload.
    pub data: Value,
}

impl StoredEvent {
    /// Key of this record in the events table.
    ///
    /// The sort key is the event name, so a migrated replacement that keeps
    /// the legacy id does not overwrite the legacy record.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::composite(&self.id, &self.name)
    }
}

impl<T: EventData> Event<T> {
    /// Creates a new event.
    #[must_use]
    pub fn new(id: impl Into<String>, time: DateTime<Utc>, data: T) -> Self {
        Self {
            id: id.into(),
            time,
            data,
        }
    }

    /// The event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.data.name()
    }

    /// Converts the event into its persisted envelope.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload fails to serialize.
    pub fn to_stored(&self) -> Result<StoredEvent, DomainError> {
        Ok(StoredEvent {
            id: self.id.clone(),
            name: self.data.name().to_owned(),
            time: self.time,
            schema_version: Some(self.data.schema_version()),
            data: self.data.to_data()?,
        })
    }

    /// Decodes a persisted envelope.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be decoded.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        let data = T::from_data(&stored.name, stored.schema_version, stored.data.clone())?;
        Ok(Self {
            id: stored.id.clone(),
            time: stored.time,
            data,
        })
    }
}

/// Checks a persisted schema tag against the generation a name belongs to.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a present tag does not match.
pub fn check_schema_version(
    name: &str,
    expected: u32,
    found: Option<u32>,
) -> Result<(), DomainError> {
    match found {
        Some(version) if version != expected => Err(DomainError::Infrastructure(format!(
            "event {name} is schema v{expected} but the record is tagged v{version}"
        ))),
        _ => Ok(()),
    }
}
