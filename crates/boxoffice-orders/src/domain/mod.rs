//! Domain model of the order ledger.

pub mod commands;
pub mod events;
pub mod fingerprint;
pub mod legacy;
pub mod order;
pub mod payment;
pub mod promotion;
