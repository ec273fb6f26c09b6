//! Cleanup deletes.
//!
//! Every delete removes `data_files` links before the `data` rows they point
//! at, then drops Files rows nobody references any more. Physical blobs are
//! not touched here: the orphaned names are returned so the caller can purge
//! them once the transaction has committed.

#![allow(clippy::result_large_err)]

use crate::blob::BlobStore;
use crate::db;
use crate::errors::{from_rusqlite, Result};
use fieldrev_core::{EmptyRevisionPolicy, FieldId, RecordId, RevisionId};
use rusqlite::{Connection, OptionalExtension, Transaction};

/// What a cleanup delete removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub revisions_deleted: usize,
    pub rows_deleted: usize,
    /// Stored filenames whose Files row was removed
    pub orphaned_files: Vec<String>,
}

impl CleanupOutcome {
    pub fn merge(&mut self, other: CleanupOutcome) {
        self.revisions_deleted += other.revisions_deleted;
        self.rows_deleted += other.rows_deleted;
        self.orphaned_files.extend(other.orphaned_files);
    }

    pub fn is_empty(&self) -> bool {
        self.revisions_deleted == 0 && self.rows_deleted == 0 && self.orphaned_files.is_empty()
    }
}

/// Remove every revision and data row of a record
pub fn delete_revisions_for_record(tx: &Transaction, record_id: RecordId) -> Result<CleanupOutcome> {
    tx.execute(
        "DELETE FROM data_files WHERE data_id IN (
            SELECT d.id FROM data d
            JOIN revisions r ON r.id = d.revision_id
            WHERE r.owning_record_id = ?1)",
        [record_id],
    )
    .map_err(from_rusqlite)?;

    let rows_deleted = tx
        .execute(
            "DELETE FROM data WHERE revision_id IN (
                SELECT id FROM revisions WHERE owning_record_id = ?1)",
            [record_id],
        )
        .map_err(from_rusqlite)?;

    let revisions_deleted = tx
        .execute(
            "DELETE FROM revisions WHERE owning_record_id = ?1",
            [record_id],
        )
        .map_err(from_rusqlite)?;

    let orphaned_files = prune_orphan_files(tx)?;

    tracing::debug!(
        record_id,
        revisions_deleted,
        rows_deleted,
        files_deleted = orphaned_files.len(),
        "Record history deleted"
    );

    Ok(CleanupOutcome {
        revisions_deleted,
        rows_deleted,
        orphaned_files,
    })
}

/// Remove all data rows of a field across every record
pub fn delete_data_for_field(
    tx: &Transaction,
    field_id: FieldId,
    policy: EmptyRevisionPolicy,
) -> Result<CleanupOutcome> {
    let affected = affected_revisions(tx, field_id, None)?;

    tx.execute(
        "DELETE FROM data_files WHERE data_id IN (SELECT id FROM data WHERE field_id = ?1)",
        [field_id],
    )
    .map_err(from_rusqlite)?;

    let rows_deleted = tx
        .execute("DELETE FROM data WHERE field_id = ?1", [field_id])
        .map_err(from_rusqlite)?;

    finish_field_delete(tx, field_id, rows_deleted, &affected, policy)
}

/// Remove the data rows of a field for the given records only
pub fn delete_data_for_field_in_records(
    tx: &Transaction,
    field_id: FieldId,
    record_ids: &[RecordId],
    policy: EmptyRevisionPolicy,
) -> Result<CleanupOutcome> {
    let mut affected = Vec::new();
    let mut rows_deleted = 0;

    for &record_id in record_ids {
        affected.extend(affected_revisions(tx, field_id, Some(record_id))?);

        tx.execute(
            "DELETE FROM data_files WHERE data_id IN (
                SELECT d.id FROM data d
                JOIN revisions r ON r.id = d.revision_id
                WHERE d.field_id = ?1 AND r.owning_record_id = ?2)",
            rusqlite::params![field_id, record_id],
        )
        .map_err(from_rusqlite)?;

        rows_deleted += tx
            .execute(
                "DELETE FROM data WHERE field_id = ?1 AND revision_id IN (
                    SELECT id FROM revisions WHERE owning_record_id = ?2)",
                rusqlite::params![field_id, record_id],
            )
            .map_err(from_rusqlite)?;
    }

    finish_field_delete(tx, field_id, rows_deleted, &affected, policy)
}

fn affected_revisions(
    tx: &Transaction,
    field_id: FieldId,
    record_id: Option<RecordId>,
) -> Result<Vec<RevisionId>> {
    let mut stmt = tx
        .prepare(
            "SELECT DISTINCT d.revision_id FROM data d
             JOIN revisions r ON r.id = d.revision_id
             WHERE d.field_id = ?1 AND (?2 IS NULL OR r.owning_record_id = ?2)",
        )
        .map_err(from_rusqlite)?;
    let ids = stmt
        .query_map(rusqlite::params![field_id, record_id], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<RevisionId>, _>>()
        .map_err(from_rusqlite)?;
    Ok(ids)
}

fn finish_field_delete(
    tx: &Transaction,
    field_id: FieldId,
    rows_deleted: usize,
    affected: &[RevisionId],
    policy: EmptyRevisionPolicy,
) -> Result<CleanupOutcome> {
    let mut revisions_deleted = 0;
    if policy == EmptyRevisionPolicy::Prune {
        for &revision_id in affected {
            revisions_deleted += tx
                .execute(
                    "DELETE FROM revisions WHERE id = ?1
                     AND NOT EXISTS (SELECT 1 FROM data WHERE revision_id = ?1)",
                    [revision_id],
                )
                .map_err(from_rusqlite)?;
        }
    }

    let orphaned_files = prune_orphan_files(tx)?;

    tracing::debug!(
        field_id,
        rows_deleted,
        revisions_deleted,
        files_deleted = orphaned_files.len(),
        "Field data deleted"
    );

    Ok(CleanupOutcome {
        revisions_deleted,
        rows_deleted,
        orphaned_files,
    })
}

/// Delete Files rows without any `data_files` link; returns their names
pub fn prune_orphan_files(tx: &Transaction) -> Result<Vec<String>> {
    let mut stmt = tx
        .prepare(
            "SELECT filename FROM files
             WHERE id NOT IN (SELECT files_id FROM data_files)
             ORDER BY id",
        )
        .map_err(from_rusqlite)?;
    let names = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(from_rusqlite)?;
    drop(stmt);

    if !names.is_empty() {
        tx.execute(
            "DELETE FROM files WHERE id NOT IN (SELECT files_id FROM data_files)",
            [],
        )
        .map_err(from_rusqlite)?;
    }
    Ok(names)
}

/// Physically remove the named blobs that no Files row references
///
/// Run after the transaction that orphaned them has committed. The lookup
/// and the removal hold the write lock, so an append linking one of the
/// names either commits first (and the blob stays) or runs after the removal
/// (and writes the blob again). Returns the number of blobs removed.
pub fn purge_blobs(conn: &mut Connection, blobs: &BlobStore, names: &[String]) -> Result<usize> {
    let tx = db::write_transaction(conn)?;
    let mut removed = 0;
    for name in names {
        let referenced: Option<i64> = tx
            .query_row("SELECT id FROM files WHERE filename = ?1", [name], |row| {
                row.get(0)
            })
            .optional()
            .map_err(from_rusqlite)?;
        if referenced.is_none() && blobs.remove(name)? {
            removed += 1;
        }
    }
    tx.commit().map_err(from_rusqlite)?;
    Ok(removed)
}
