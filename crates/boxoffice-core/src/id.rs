//! Unique identifier abstraction for determinism.
//!
//! In production, identifiers are UUIDs. In tests and replays, a sequential
//! implementation is injected so event and payment ids are predictable.

use uuid::Uuid;

/// Abstraction over unique identifier generation.
///
/// Replay and migration order events of the same instant by id, compared as
/// strings. Ids must therefore sort in the order they were generated.
pub trait IdGenerator: Send + Sync {
    /// Returns a new identifier that has never been returned before.
    fn generate(&self) -> String;
}

/// Production generator backed by time-ordered UUIDs (v7).
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::now_v7().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_generator_never_repeats() {
        let generator = UuidGenerator;

        let first = generator.generate();
        let second = generator.generate();

        assert_ne!(first, second);
        Uuid::parse_str(&first).unwrap();
    }

    #[test]
    fn test_uuid_generator_ids_sort_in_generation_order() {
        let generator = UuidGenerator;

        let ids: Vec<String> = (0..50).map(|_| generator.generate()).collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }
}
