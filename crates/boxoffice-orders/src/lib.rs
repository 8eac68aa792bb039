//! Box Office — order ledger.
//!
//! Responsible for checkout, payment status changes and guest check-in as an
//! append-only event log, the order and payment projections derived from it,
//! and the migration of legacy event generations.

pub mod application;
pub mod domain;
