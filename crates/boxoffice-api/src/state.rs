//! Shared application state.

use std::sync::Arc;

use boxoffice_core::id::IdGenerator;
use boxoffice_core::time::Clock;
use boxoffice_orders::application::repository::OrderRepository;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The order ledger.
    pub repository: OrderRepository,
    /// Injected clock for order dates and due dates.
    pub clock: Arc<dyn Clock>,
    /// Injected identifier generator for new orders and payments.
    pub ids: Arc<dyn IdGenerator>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        repository: OrderRepository,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            repository,
            clock,
            ids,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}
