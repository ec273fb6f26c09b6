//! Schema migrations for the ledger tables
//!
//! Each step in [`catalog::MIGRATIONS`] is applied once and recorded in
//! `schema_version` with the checksum of its SQL. A recorded step whose SQL
//! has since changed stops the run with a consistency error.

mod catalog;
mod runner;

pub use catalog::{Migration, MIGRATIONS};
pub use runner::{applied_migrations, apply_migrations};
