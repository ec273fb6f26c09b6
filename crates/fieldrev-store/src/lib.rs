//! fieldrev store - persistence for the revision ledger
//!
//! Provides:
//! - SQLite schema with a migrations framework
//! - Filesystem blob store for uploaded files, keyed by stored filename
//! - Revision ledger: atomic append, point-in-time queries, cleanup deletes
//! - Integrity checks for orphaned rows

pub mod blob;
pub mod db;
pub mod errors;
pub mod integrity;
pub mod ledger;
pub mod migrations;

// Re-export key types
pub use blob::BlobStore;
pub use errors::Result;
pub use integrity::ConsistencyReport;
