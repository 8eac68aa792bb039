//! Route modules organized by use case.

pub mod admin;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod payments;
