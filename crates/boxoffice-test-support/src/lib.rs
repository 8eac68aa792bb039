//! Shared test fakes and utilities for the Box Office ledger.

mod clock;
mod id;
mod store;

pub use clock::FixedClock;
pub use id::SequenceIdGenerator;
pub use store::{FailingKeyValueStore, InMemoryKeyValueStore};
