#![allow(clippy::result_large_err)]

use super::catalog::{Migration, MIGRATIONS};
use crate::errors::{checksum_mismatch, from_rusqlite, migration_error, Result};
use rusqlite::{params, Connection, OptionalExtension};

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY,
    migration_id TEXT NOT NULL UNIQUE,
    applied_at INTEGER NOT NULL,
    checksum TEXT
)";

enum Status {
    Pending,
    Current,
    Changed { recorded: String },
}

/// Bring the database up to the newest schema
///
/// # Errors
///
/// - `StorageFailure` when a step's SQL fails; that step is rolled back
/// - `ConsistencyError` when an applied step's SQL no longer matches its
///   recorded checksum
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(VERSION_TABLE, []).map_err(from_rusqlite)?;

    let mut applied = 0usize;
    for migration in MIGRATIONS {
        match status(conn, migration)? {
            Status::Current => {}
            Status::Changed { recorded } => {
                return Err(checksum_mismatch(
                    migration.id,
                    &recorded,
                    &migration.checksum(),
                ))
            }
            Status::Pending => {
                run_step(conn, migration)?;
                applied += 1;
            }
        }
    }
    if applied > 0 {
        tracing::info!(applied, "Ledger schema migrated");
    }
    Ok(())
}

/// Ids recorded in `schema_version`, oldest first
///
/// # Errors
///
/// `StorageFailure` when the table cannot be read
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT migration_id FROM schema_version ORDER BY id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?;
    rows.collect::<std::result::Result<_, _>>()
        .map_err(from_rusqlite)
}

fn status(conn: &Connection, migration: &Migration) -> Result<Status> {
    let row: Option<Option<String>> = conn
        .query_row(
            "SELECT checksum FROM schema_version WHERE migration_id = ?1",
            [migration.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;
    Ok(match row {
        None => Status::Pending,
        // rows written without a checksum are trusted
        Some(None) => Status::Current,
        Some(Some(recorded)) if recorded == migration.checksum() => Status::Current,
        Some(Some(recorded)) => Status::Changed { recorded },
    })
}

fn run_step(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_version (migration_id, applied_at, checksum) VALUES (?1, ?2, ?3)",
        params![
            migration.id,
            chrono::Utc::now().timestamp_millis(),
            migration.checksum()
        ],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)?;
    tracing::debug!(migration_id = migration.id, "Applied migration");
    Ok(())
}
