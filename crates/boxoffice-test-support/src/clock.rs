//! Test clocks — deterministic `Clock` implementations for tests.

use boxoffice_core::time::Clock;
use chrono::{DateTime, Duration, TimeZone, Utc};

/// A clock that always returns a fixed point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// The instant most fixtures use: 2026-01-15 10:00:00 UTC.
    ///
    /// # Panics
    ///
    /// Never in practice; the date literal is valid.
    #[must_use]
    pub fn fixture() -> Self {
        Self(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    /// Returns a clock shifted by `offset`.
    #[must_use]
    pub fn advanced(self, offset: Duration) -> Self {
        Self(self.0 + offset)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
