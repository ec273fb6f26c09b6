//! Revision ledger
//!
//! Append-only revisions with per-field data rows, plus the deletes the
//! cleanup coordinator needs. Writers take a `Transaction` so the caller owns
//! the commit; readers take a plain `Connection`.

pub mod append;
pub mod cleanup;
pub mod query;

pub use append::{append_revision, AppendOutcome};
pub use cleanup::{
    delete_data_for_field, delete_data_for_field_in_records, delete_revisions_for_record,
    prune_orphan_files, purge_blobs, CleanupOutcome,
};
pub use query::{
    count_data_rows, count_revisions, data_as_of, fields_with_history, file_by_name, history,
    latest_revision_at, revision_before, revision_by_id, revision_number, revisions_for_record,
    FileRow, RevisionRow, RevisionSummary,
};
