//! Box Office event store.
//!
//! [`event_store::EventStore`] appends events together with the projection
//! writes they produce; [`pg_store::PgKeyValueStore`] is the `PostgreSQL`
//! implementation of the key-value capability it writes through.

pub mod event_store;
pub mod pg_store;
