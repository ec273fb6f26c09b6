//! Connections to the ledger database
//!
//! SQLite connections are not shared between threads; each writer opens its
//! own and saves of one record serialize on the database write lock.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use crate::migrations::apply_migrations;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

/// Wait for a competing writer this long before giving up
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path).map_err(from_rusqlite)
}

pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Open, configure and migrate in one step
///
/// # Errors
///
/// `StorageFailure` when the file cannot be opened or a migration fails;
/// `ConsistencyError` when an applied migration was edited
pub fn open_ledger<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let mut conn = open(path)?;
    configure(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

/// Turn on foreign keys and WAL, and set [`BUSY_TIMEOUT`]
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(from_rusqlite)?;
    // an in-memory database answers "memory" and stays that way
    let journal: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .map_err(from_rusqlite)?;
    tracing::trace!(journal_mode = %journal, "Connection configured");
    conn.busy_timeout(BUSY_TIMEOUT).map_err(from_rusqlite)
}

/// Begin a transaction holding the write lock from its first statement
///
/// Reading the baseline and appending the revision then happen under one
/// lock, so two saves of the same record cannot both diff against the same
/// head.
pub fn write_transaction(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(from_rusqlite)
}
