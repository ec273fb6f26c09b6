//! Store-side constructors for [`ExError`]
//!
//! Everything below the engine reports through the shared error type; these
//! helpers fix the kind and the `op` tag for each failure site.

use fieldrev_core::errors::{ExError, ExErrorKind};

pub type Result<T> = std::result::Result<T, ExError>;

/// A migration step's SQL failed; the step was rolled back
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::StorageFailure)
        .with_op("migrate")
        .with_message(format!("step {} rolled back: {}", migration_id, reason))
}

/// An applied migration step was edited after the fact
pub fn checksum_mismatch(migration_id: &str, recorded: &str, current: &str) -> ExError {
    ExError::new(ExErrorKind::ConsistencyError)
        .with_op("migrate")
        .with_message(format!(
            "step {} was applied with checksum {} but its SQL now hashes to {}",
            migration_id, recorded, current
        ))
}

/// The stored name is taken by different bytes
pub fn blob_collision(name: &str) -> ExError {
    ExError::new(ExErrorKind::BlobCollision)
        .with_op("blob_put")
        .with_message(format!("{} already holds different content", name))
}

pub fn blob_missing(name: &str) -> ExError {
    ExError::new(ExErrorKind::MissingBlob)
        .with_op("blob_get")
        .with_message(format!("no stored file named {}", name))
}

/// Any SQLite failure; lock timeouts are called out in the message
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let busy = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    );
    let message = if busy {
        format!("database lock not acquired: {}", err)
    } else {
        err.to_string()
    };
    ExError::new(ExErrorKind::StorageFailure)
        .with_op("sqlite")
        .with_message(message)
}

pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
