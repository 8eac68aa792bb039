//! Test id generator — predictable `IdGenerator` for tests.

use std::sync::atomic::{AtomicU64, Ordering};

use boxoffice_core::id::IdGenerator;

/// Generates `"{prefix}-1"`, `"{prefix}-2"`, ... in order.
///
/// The numbers are not padded, so ids only sort in generation order up to
/// `"{prefix}-9"`. Tests that replay ten or more events at one instant need
/// distinct event times.
#[derive(Debug)]
pub struct SequenceIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequenceIdGenerator {
    /// Create a generator producing ids with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self::new("id")
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}
