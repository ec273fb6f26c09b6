//! Ledger read operations.
//!
//! Rows are ordered by revision creation time, then revision id, then data
//! row id, which is the order reconstruction folds them in.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use fieldrev_core::diff::FileMeta;
use fieldrev_core::snapshot::StoredRow;
use fieldrev_core::{FieldId, RecordId, RevisionId, UserId};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::collections::BTreeSet;

/// A revision row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionRow {
    pub id: RevisionId,
    pub record_id: RecordId,
    pub user_id: UserId,
    pub username: String,
    /// Unix milliseconds
    pub created_at: i64,
}

/// A revision with the fields it touched, for history listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevisionSummary {
    pub revision: RevisionRow,
    pub field_ids: Vec<FieldId>,
}

/// A stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRow {
    pub id: i64,
    pub content_hash: String,
    pub filename: String,
    pub size: i64,
    pub mime_type: String,
}

const REVISION_COLUMNS: &str =
    "id, owning_record_id, acting_user_id, acting_username, created_at";

fn revision_from_row(row: &Row<'_>) -> rusqlite::Result<RevisionRow> {
    Ok(RevisionRow {
        id: row.get(0)?,
        record_id: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Get a revision by id
pub fn revision_by_id(conn: &Connection, id: RevisionId) -> Result<Option<RevisionRow>> {
    conn.query_row(
        &format!("SELECT {} FROM revisions WHERE id = ?1", REVISION_COLUMNS),
        [id],
        revision_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Latest revision of a record created at or before `at` (unix ms);
/// ties on the timestamp go to the highest id
pub fn latest_revision_at(
    conn: &Connection,
    record_id: RecordId,
    at: i64,
) -> Result<Option<RevisionRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM revisions
             WHERE owning_record_id = ?1 AND created_at <= ?2
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            REVISION_COLUMNS
        ),
        rusqlite::params![record_id, at],
        revision_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// The record's revision immediately preceding `revision` in ledger order
pub fn revision_before(conn: &Connection, revision: &RevisionRow) -> Result<Option<RevisionRow>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM revisions
             WHERE owning_record_id = ?1
               AND (created_at < ?2 OR (created_at = ?2 AND id < ?3))
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            REVISION_COLUMNS
        ),
        rusqlite::params![revision.record_id, revision.created_at, revision.id],
        revision_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Highest revision id owned by the record
pub fn revision_number(conn: &Connection, record_id: RecordId) -> Result<Option<RevisionId>> {
    conn.query_row(
        "SELECT MAX(id) FROM revisions WHERE owning_record_id = ?1",
        [record_id],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

/// All revisions of a record in ledger order
pub fn revisions_for_record(conn: &Connection, record_id: RecordId) -> Result<Vec<RevisionRow>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM revisions WHERE owning_record_id = ?1 ORDER BY created_at, id",
            REVISION_COLUMNS
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([record_id], revision_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(rows)
}

/// Revisions of a record, newest first, with the fields each one touched
pub fn history(conn: &Connection, record_id: RecordId) -> Result<Vec<RevisionSummary>> {
    let mut revisions = revisions_for_record(conn, record_id)?;
    revisions.reverse();

    let mut stmt = conn
        .prepare("SELECT DISTINCT field_id FROM data WHERE revision_id = ?1 ORDER BY field_id")
        .map_err(from_rusqlite)?;

    let mut summaries = Vec::with_capacity(revisions.len());
    for revision in revisions {
        let field_ids = stmt
            .query_map([revision.id], |row| row.get(0))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<FieldId>, _>>()
            .map_err(from_rusqlite)?;
        summaries.push(RevisionSummary {
            revision,
            field_ids,
        });
    }
    Ok(summaries)
}

/// Data rows of a record in ledger order, optionally limited to one field
///
/// With `upto`, only rows of revisions at or before that revision in ledger
/// order (`created_at`, then id) are returned, matching [`revision_before`].
pub fn data_as_of(
    conn: &Connection,
    record_id: RecordId,
    field_id: Option<FieldId>,
    upto: Option<RevisionId>,
) -> Result<Vec<StoredRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT d.revision_id, d.field_id, d.property, d.value,
                    f.filename, f.mime_type, f.size
             FROM data d
             JOIN revisions r ON r.id = d.revision_id
             LEFT JOIN data_files df ON df.data_id = d.id
             LEFT JOIN files f ON f.id = df.files_id
             WHERE r.owning_record_id = ?1
               AND (?2 IS NULL OR d.field_id = ?2)
               AND (?3 IS NULL OR EXISTS (
                   SELECT 1 FROM revisions b
                   WHERE b.id = ?3
                     AND (r.created_at < b.created_at
                          OR (r.created_at = b.created_at AND r.id <= b.id))))
             ORDER BY r.created_at, r.id, d.id",
        )
        .map_err(from_rusqlite)?;

    let rows = stmt
        .query_map(rusqlite::params![record_id, field_id, upto], |row| {
            let filename: Option<String> = row.get(4)?;
            let file = match filename {
                Some(filename) => Some(FileMeta {
                    filename,
                    mime_type: row.get(5)?,
                    size: row.get::<_, i64>(6)?.max(0) as u64,
                }),
                None => None,
            };
            Ok(StoredRow {
                revision_id: row.get(0)?,
                field_id: row.get(1)?,
                property: row.get(2)?,
                value: row.get(3)?,
                file,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;

    Ok(rows)
}

/// Fields of a record that have at least one data row
pub fn fields_with_history(conn: &Connection, record_id: RecordId) -> Result<BTreeSet<FieldId>> {
    let mut stmt = conn
        .prepare(
            "SELECT DISTINCT d.field_id FROM data d
             JOIN revisions r ON r.id = d.revision_id
             WHERE r.owning_record_id = ?1",
        )
        .map_err(from_rusqlite)?;
    let ids = stmt
        .query_map([record_id], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<BTreeSet<FieldId>, _>>()
        .map_err(from_rusqlite)?;
    Ok(ids)
}

/// Look up a stored file by its stored filename
pub fn file_by_name(conn: &Connection, filename: &str) -> Result<Option<FileRow>> {
    conn.query_row(
        "SELECT id, content_hash, filename, size, mime_type FROM files WHERE filename = ?1",
        [filename],
        |row| {
            Ok(FileRow {
                id: row.get(0)?,
                content_hash: row.get(1)?,
                filename: row.get(2)?,
                size: row.get(3)?,
                mime_type: row.get(4)?,
            })
        },
    )
    .optional()
    .map_err(from_rusqlite)
}

pub fn count_revisions(conn: &Connection, record_id: RecordId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM revisions WHERE owning_record_id = ?1",
        [record_id],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

pub fn count_data_rows(conn: &Connection, record_id: RecordId) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM data d
         JOIN revisions r ON r.id = d.revision_id
         WHERE r.owning_record_id = ?1",
        [record_id],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}
