//! Ledger integrity checks
//!
//! Orphaned rows are reported, never repaired.

#![allow(clippy::result_large_err)]

use crate::blob::BlobStore;
use crate::errors::{from_rusqlite, Result};
use fieldrev_core::errors::{ExError, ExErrorKind};
use rusqlite::Connection;

/// Orphans found in the ledger tables
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// (data_id, files_id) links whose data row is gone
    pub data_files_without_data: Vec<(i64, i64)>,
    /// (data_id, files_id) links whose Files row is gone
    pub data_files_without_files: Vec<(i64, i64)>,
    /// Files rows no data row links to
    pub files_without_data_files: Vec<i64>,
    /// Data rows whose revision is gone
    pub data_without_revisions: Vec<i64>,
    /// Stored filenames with a Files row but no blob on disk
    pub missing_blobs: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.data_files_without_data.is_empty()
            && self.data_files_without_files.is_empty()
            && self.files_without_data_files.is_empty()
            && self.data_without_revisions.is_empty()
            && self.missing_blobs.is_empty()
    }

    pub fn problem_count(&self) -> usize {
        self.data_files_without_data.len()
            + self.data_files_without_files.len()
            + self.files_without_data_files.len()
            + self.data_without_revisions.len()
            + self.missing_blobs.len()
    }
}

fn pairs(conn: &Connection, sql: &str) -> Result<Vec<(i64, i64)>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

fn ids(conn: &Connection, sql: &str) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Scan the ledger tables for orphaned rows
pub fn check(conn: &Connection) -> Result<ConsistencyReport> {
    Ok(ConsistencyReport {
        data_files_without_data: pairs(
            conn,
            "SELECT data_id, files_id FROM data_files
             WHERE data_id NOT IN (SELECT id FROM data)
             ORDER BY data_id, files_id",
        )?,
        data_files_without_files: pairs(
            conn,
            "SELECT data_id, files_id FROM data_files
             WHERE files_id NOT IN (SELECT id FROM files)
             ORDER BY data_id, files_id",
        )?,
        files_without_data_files: ids(
            conn,
            "SELECT id FROM files
             WHERE id NOT IN (SELECT files_id FROM data_files)
             ORDER BY id",
        )?,
        data_without_revisions: ids(
            conn,
            "SELECT id FROM data
             WHERE revision_id NOT IN (SELECT id FROM revisions)
             ORDER BY id",
        )?,
        missing_blobs: Vec::new(),
    })
}

/// Like [`check`], and also verifies every Files row has its blob on disk
pub fn check_with_blobs(conn: &Connection, blobs: &BlobStore) -> Result<ConsistencyReport> {
    let mut report = check(conn)?;

    let mut stmt = conn
        .prepare("SELECT filename FROM files ORDER BY id")
        .map_err(from_rusqlite)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    report.missing_blobs = names.into_iter().filter(|n| !blobs.exists(n)).collect();

    Ok(report)
}

/// Fail with `ConsistencyError` when the report is not clean
pub fn ensure_consistent(report: &ConsistencyReport) -> Result<()> {
    if report.is_clean() {
        return Ok(());
    }
    tracing::warn!(
        problems = report.problem_count(),
        "Ledger consistency check failed"
    );
    Err(ExError::new(ExErrorKind::ConsistencyError)
        .with_op("integrity_check")
        .with_message(format!(
            "{} orphaned data_files links without data, {} without files, \
             {} unreferenced files, {} data rows without revision, {} missing blobs",
            report.data_files_without_data.len(),
            report.data_files_without_files.len(),
            report.files_without_data_files.len(),
            report.data_without_revisions.len(),
            report.missing_blobs.len()
        )))
}
