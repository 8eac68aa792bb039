//! Box Office Core — shared ledger abstractions.
//!
//! This crate defines the event envelope, the key-value store capability the
//! ledger is written against, and the injected clock and id generator. It
//! contains no infrastructure code.

pub mod config;
pub mod error;
pub mod event;
pub mod id;
pub mod store;
pub mod time;
