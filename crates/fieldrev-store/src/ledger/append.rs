//! Atomic revision append.

#![allow(clippy::result_large_err)]

use crate::blob::BlobStore;
use crate::errors::{blob_collision, blob_missing, from_rusqlite, Result};
use fieldrev_core::blob_naming::content_hash;
use fieldrev_core::diff::ChangeEntry;
use fieldrev_core::errors::{ExError, ExErrorKind};
use fieldrev_core::{ActingUser, RecordId, RevisionId};
use rusqlite::{OptionalExtension, Transaction};

/// Result of appending a revision
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    pub revision_id: RevisionId,
    pub data_rows: usize,
    /// Files rows created by this append (reused rows are not counted)
    pub files_created: usize,
    /// Blobs physically written by this append; the caller removes them
    /// again if the transaction does not commit
    pub blobs_written: Vec<String>,
}

/// Append one revision with one data row per entry
///
/// File entries are linked to the Files row carrying their stored filename;
/// the row (and the physical blob) is created from the entry's bytes when it
/// does not exist yet.
///
/// Nothing is visible to readers until the caller commits `tx`.
///
/// # Errors
///
/// - `InvalidInput` when `entries` is empty
/// - `BlobCollision` when different bytes are already stored under a name
/// - `MissingBlob` when a file entry has no bytes and no Files row exists
/// - `StorageFailure` on any database error
pub fn append_revision(
    tx: &Transaction,
    blobs: &BlobStore,
    record_id: RecordId,
    user: &ActingUser,
    created_at: i64,
    entries: &[ChangeEntry],
) -> Result<AppendOutcome> {
    if entries.is_empty() {
        return Err(ExError::new(ExErrorKind::InvalidInput)
            .with_op("append_revision")
            .with_record_id(record_id)
            .with_message("A revision needs at least one data row"));
    }

    tx.execute(
        "INSERT INTO revisions (owning_record_id, acting_user_id, acting_username, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![record_id, user.id, user.name, created_at],
    )
    .map_err(from_rusqlite)?;
    let revision_id = tx.last_insert_rowid();

    let mut outcome = AppendOutcome {
        revision_id,
        ..AppendOutcome::default()
    };

    for entry in entries {
        tx.execute(
            "INSERT INTO data (revision_id, field_id, property, value) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                revision_id,
                entry.field_id,
                entry.property.to_string(),
                entry.value
            ],
        )
        .map_err(|e| {
            from_rusqlite(e)
                .with_op("append_revision")
                .with_record_id(record_id)
                .with_field_id(entry.field_id)
        })?;
        let data_id = tx.last_insert_rowid();
        outcome.data_rows += 1;

        if entry.file.is_some() {
            attach_file(tx, blobs, record_id, data_id, entry, &mut outcome)?;
        }
    }

    tracing::debug!(
        record_id,
        revision_id,
        entry_count = outcome.data_rows,
        files_created = outcome.files_created,
        "Revision appended"
    );

    Ok(outcome)
}

fn attach_file(
    tx: &Transaction,
    blobs: &BlobStore,
    record_id: RecordId,
    data_id: i64,
    entry: &ChangeEntry,
    outcome: &mut AppendOutcome,
) -> Result<()> {
    let Some(meta) = entry.file.as_ref() else {
        return Ok(());
    };
    let context = |err: ExError| {
        err.with_op("append_revision")
            .with_record_id(record_id)
            .with_field_id(entry.field_id)
    };

    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, content_hash FROM files WHERE filename = ?1",
            [&meta.filename],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(from_rusqlite)?;

    let files_id = match (existing, entry.blob.as_deref()) {
        (Some((id, hash)), Some(bytes)) => {
            if content_hash(bytes) != hash {
                return Err(context(blob_collision(&meta.filename)));
            }
            // the Files row outlived its blob; restore it
            if !blobs.exists(&meta.filename) && blobs.write(&meta.filename, bytes)? {
                outcome.blobs_written.push(meta.filename.clone());
            }
            id
        }
        (Some((id, _)), None) => id,
        (None, Some(bytes)) => {
            tx.execute(
                "INSERT INTO files (content_hash, filename, size, mime_type)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    content_hash(bytes),
                    meta.filename,
                    bytes.len() as i64,
                    meta.mime_type
                ],
            )
            .map_err(from_rusqlite)?;
            let id = tx.last_insert_rowid();
            // written once the row pins the name
            if blobs.write(&meta.filename, bytes).map_err(context)? {
                outcome.blobs_written.push(meta.filename.clone());
            }
            outcome.files_created += 1;
            id
        }
        (None, None) => return Err(context(blob_missing(&meta.filename))),
    };

    tx.execute(
        "INSERT OR IGNORE INTO data_files (data_id, files_id) VALUES (?1, ?2)",
        rusqlite::params![data_id, files_id],
    )
    .map_err(from_rusqlite)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrations::apply_migrations;
    use fieldrev_core::diff::{FileMeta, PropertyKey};
    use tempfile::TempDir;

    fn setup() -> (rusqlite::Connection, BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut conn = db::open_in_memory().unwrap();
        db::configure(&conn).unwrap();
        apply_migrations(&mut conn).unwrap();
        (conn, BlobStore::new(dir.path()), dir)
    }

    fn file_entry(name: &str, bytes: Option<&[u8]>) -> ChangeEntry {
        ChangeEntry {
            field_id: 4,
            property: PropertyKey::Index(0),
            value: format!(r#"{{"filename":"{}"}}"#, name),
            file: Some(FileMeta {
                filename: name.to_string(),
                mime_type: "image/png".to_string(),
                size: bytes.map(|b| b.len() as u64).unwrap_or(0),
            }),
            blob: bytes.map(|b| b.to_vec()),
        }
    }

    #[test]
    fn test_empty_entries_rejected() {
        let (mut conn, blobs, _dir) = setup();
        let tx = db::write_transaction(&mut conn).unwrap();
        let err = append_revision(&tx, &blobs, 1, &ActingUser::new(41, "admin"), 0, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_file_row_reused_by_name() {
        let (mut conn, blobs, _dir) = setup();
        let bytes = b"image";
        let name = format!("{}.png", content_hash(bytes));
        let user = ActingUser::new(41, "admin");

        let tx = db::write_transaction(&mut conn).unwrap();
        let first = append_revision(&tx, &blobs, 1, &user, 1, &[file_entry(&name, Some(bytes))])
            .unwrap();
        let second = append_revision(&tx, &blobs, 2, &user, 2, &[file_entry(&name, None)])
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(first.files_created, 1);
        assert_eq!(first.blobs_written, vec![name.clone()]);
        assert_eq!(second.files_created, 0);
        let files: i64 = conn
            .query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))
            .unwrap();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_missing_blob_without_bytes() {
        let (mut conn, blobs, _dir) = setup();
        let tx = db::write_transaction(&mut conn).unwrap();
        let err = append_revision(
            &tx,
            &blobs,
            1,
            &ActingUser::new(41, "admin"),
            1,
            &[file_entry("ffff.png", None)],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MissingBlob);
        assert_eq!(err.field_id(), Some(4));
    }
}
