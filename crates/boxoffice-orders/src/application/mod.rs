//! Application layer: projection writers, the repository façade and the
//! schema migrator.

pub mod migration;
pub mod projections;
pub mod repository;
