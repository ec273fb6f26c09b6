//! Version-control orchestration: save, snapshot, revert.
//!
//! ## Logging
//!
//! Lifecycle events (`start`, then `end` or `end_error`) are emitted here and
//! nowhere below. Each public operation runs inside a span carrying a fresh
//! `request_id`; store and core only log at debug level.
//!
//! ## Save pipeline
//!
//! 1. Name pending uploads (content hash + extension, suffixed on clashes)
//! 2. Open an IMMEDIATE transaction so same-record saves serialize
//! 3. Replay the ledger to get the last recorded state of each tracked field
//! 4. Diff the record against it; nothing changed means no revision
//! 5. Append one revision per changed record (nested records included)
//! 6. Commit; on failure remove blobs this save wrote

#![allow(clippy::result_large_err)]

use crate::cleanup::CleanupCoordinator;
use crate::host::{Clock, HostAccessor, SystemClock};
use fieldrev_core::blob_naming::assign_stored_names;
use fieldrev_core::core_types::schema::{OP_REVERT, OP_SAVE, OP_SNAPSHOT};
use fieldrev_core::core_types::RequestContext;
use fieldrev_core::diff::{compute_changes, ChangeEntry};
use fieldrev_core::errors::{ExError, ExErrorKind};
use fieldrev_core::snapshot::reconstruct_fields;
use fieldrev_core::{
    log_op_end, log_op_error, log_op_start, ActingUser, FieldDef, FieldValue,
    NestedSnapshotPolicy, Record, RecordId, RevisionId, SnapshotTarget, TemplateId,
    TrackingConfig,
};
use fieldrev_store::errors::{from_rusqlite, Result};
use fieldrev_store::integrity::{self, ConsistencyReport};
use fieldrev_store::ledger::{self, RevisionRow, RevisionSummary};
use fieldrev_store::{db, BlobStore};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

static SYSTEM_CLOCK: SystemClock = SystemClock;

/// One revision appended by a save
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedRevision {
    pub record_id: RecordId,
    pub revision_id: RevisionId,
    pub data_rows: usize,
}

/// Result of a save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    /// Revisions appended, parent first, then nested records depth-first
    pub revisions: Vec<SavedRevision>,
}

impl SaveOutcome {
    /// True when no tracked field changed anywhere
    pub fn is_noop(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn revision_for(&self, record_id: RecordId) -> Option<RevisionId> {
        self.revisions
            .iter()
            .find(|r| r.record_id == record_id)
            .map(|r| r.revision_id)
    }

    pub fn total_rows(&self) -> usize {
        self.revisions.iter().map(|r| r.data_rows).sum()
    }
}

/// Result of a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotOutcome {
    /// Revision the record was rewound to; `None` leaves the live state
    pub revision: Option<RevisionId>,
    /// Nested records that were rewound, with the revision each one used
    pub nested: BTreeMap<RecordId, RevisionId>,
}

/// Result of a revert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevertOutcome {
    pub snapshot: SnapshotOutcome,
    pub saved: SaveOutcome,
}

pub(crate) fn op_span(ctx: &RequestContext) -> tracing::Span {
    tracing::info_span!("fieldrev", op = ctx.op, request_id = %ctx.request_id)
}

/// Version-control entry point
///
/// Holds only shared references; each thread passes its own connection.
#[derive(Clone, Copy)]
pub struct VersionControl<'a> {
    config: &'a TrackingConfig,
    host: &'a dyn HostAccessor,
    blobs: &'a BlobStore,
    clock: &'a dyn Clock,
}

impl<'a> VersionControl<'a> {
    pub fn new(config: &'a TrackingConfig, host: &'a dyn HostAccessor, blobs: &'a BlobStore) -> Self {
        Self {
            config,
            host,
            blobs,
            clock: &SYSTEM_CLOCK,
        }
    }

    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &'a TrackingConfig {
        self.config
    }

    pub fn blobs(&self) -> &'a BlobStore {
        self.blobs
    }

    /// Cleanup handlers sharing this configuration
    pub fn cleanup(&self) -> CleanupCoordinator<'a> {
        CleanupCoordinator::new(self.config, self.host, self.blobs)
    }

    /// Tracked fields of a template's current fieldgroup
    ///
    /// Empty for untracked templates. Ids the host no longer knows are
    /// skipped with a configuration warning.
    pub fn tracked_defs(&self, template_id: TemplateId) -> Vec<FieldDef> {
        if !self.config.is_template_tracked(template_id) {
            return Vec::new();
        }
        let Some(fieldgroup) = self.host.template_fields(template_id) else {
            tracing::warn!(
                template_id,
                err.code = ExErrorKind::ConfigurationError.code(),
                "Tracked template is unknown to the host, skipped"
            );
            return Vec::new();
        };
        fieldgroup
            .into_iter()
            .filter(|id| self.config.is_field_tracked(*id))
            .filter_map(|id| {
                let def = self.host.field(id);
                if def.is_none() {
                    tracing::warn!(
                        field_id = id,
                        err.code = ExErrorKind::ConfigurationError.code(),
                        "Tracked field is unknown to the host, skipped"
                    );
                }
                def
            })
            .collect()
    }

    /// Record a save
    ///
    /// `previous` is the host's pre-save state, used as the baseline for
    /// tracked fields that have no recorded history yet; without it those
    /// fields compare against their kind's empty value. Pending uploads on
    /// the record get their stored filenames assigned and are cleared once
    /// the save commits. On return `record.revision` holds the record's head.
    ///
    /// # Errors
    ///
    /// - `StorageFailure` when the transaction cannot commit; nothing is kept
    /// - `BlobCollision` / `MissingBlob` for file fields that cannot be stored
    /// - `InvalidInput` when a value disagrees with its field's kind
    pub fn save(
        &self,
        conn: &mut Connection,
        record: &mut Record,
        previous: Option<&Record>,
        user: &ActingUser,
    ) -> Result<SaveOutcome> {
        let ctx = RequestContext::new(OP_SAVE);
        let span = op_span(&ctx);
        let _guard = span.enter();
        let record_id = record.id;

        log_op_start!(OP_SAVE, record_id = record_id);

        let outcome = self
            .save_impl(conn, record, previous, user)
            .map_err(|e| {
                let e = e.with_request_id(ctx.request_id);
                log_op_error!(
                    OP_SAVE,
                    e.clone(),
                    duration_ms = ctx.elapsed_ms(),
                    record_id = record_id
                );
                e
            })?;

        log_op_end!(
            OP_SAVE,
            duration_ms = ctx.elapsed_ms(),
            record_id = record_id,
            revision_count = outcome.revisions.len(),
            entry_count = outcome.total_rows()
        );

        Ok(outcome)
    }

    fn save_impl(
        &self,
        conn: &mut Connection,
        record: &mut Record,
        previous: Option<&Record>,
        user: &ActingUser,
    ) -> Result<SaveOutcome> {
        let now = self.clock.now();
        self.name_uploads(record, now.timestamp());

        let mut outcome = SaveOutcome::default();
        let mut written = Vec::new();

        let committed = {
            let tx = db::write_transaction(conn)?;
            self.save_record_tx(
                &tx,
                record,
                previous,
                user,
                now.timestamp_millis(),
                &mut written,
                &mut outcome,
            )
            .and_then(|()| tx.commit().map_err(from_rusqlite))
        };

        if let Err(err) = committed {
            if !written.is_empty() {
                if let Err(purge_err) = ledger::purge_blobs(conn, self.blobs, &written) {
                    tracing::warn!(
                        err.code = purge_err.code(),
                        blob_count = written.len(),
                        "Could not remove blobs of a rolled back save"
                    );
                }
            }
            return Err(err);
        }

        self.clear_uploads(record);
        Ok(outcome)
    }

    fn name_uploads(&self, record: &mut Record, now_secs: i64) {
        if self.config.is_template_tracked(record.template_id) {
            for value in record.values.values_mut() {
                if let FieldValue::Files(items) = value {
                    assign_stored_names(items, now_secs);
                }
            }
        }
        for child in record.nested.iter_mut() {
            self.name_uploads(child, now_secs);
        }
    }

    fn clear_uploads(&self, record: &mut Record) {
        if self.config.is_template_tracked(record.template_id) {
            for value in record.values.values_mut() {
                if let FieldValue::Files(items) = value {
                    for item in items.iter_mut() {
                        item.upload = None;
                    }
                }
            }
        }
        for child in record.nested.iter_mut() {
            self.clear_uploads(child);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn save_record_tx(
        &self,
        tx: &Transaction,
        record: &mut Record,
        previous: Option<&Record>,
        user: &ActingUser,
        created_at: i64,
        written: &mut Vec<String>,
        outcome: &mut SaveOutcome,
    ) -> Result<()> {
        let defs = self.tracked_defs(record.template_id);
        if !defs.is_empty() {
            let rows = ledger::data_as_of(tx, record.id, None, None)?;
            let mut baseline =
                reconstruct_fields(&rows, &defs).map_err(|e| e.with_record_id(record.id))?;

            if let Some(previous) = previous {
                let with_history: HashSet<_> = rows.iter().map(|r| r.field_id).collect();
                for def in defs.iter().filter(|d| !with_history.contains(&d.id)) {
                    if let Some(value) = previous.get(def.id) {
                        baseline.insert(def.id, value.clone());
                    }
                }
            }

            let mut entries = compute_changes(record, &baseline, &defs)?;
            if entries.is_empty() {
                tracing::debug!(record_id = record.id, "No tracked field changed");
                record.revision = ledger::revision_number(tx, record.id)?;
            } else {
                self.fill_missing_bytes(tx, record.id, &mut entries)?;
                let appended = ledger::append_revision(
                    tx,
                    self.blobs,
                    record.id,
                    user,
                    created_at,
                    &entries,
                )?;
                written.extend(appended.blobs_written);
                record.revision = Some(appended.revision_id);
                outcome.revisions.push(SavedRevision {
                    record_id: record.id,
                    revision_id: appended.revision_id,
                    data_rows: appended.data_rows,
                });
            }
        }

        for child in record.nested.iter_mut() {
            let child_previous = previous.and_then(|p| p.nested.iter().find(|c| c.id == child.id));
            self.save_record_tx(tx, child, child_previous, user, created_at, written, outcome)?;
        }
        Ok(())
    }

    /// File entries without bytes and without a Files row take their bytes
    /// from the host
    fn fill_missing_bytes(
        &self,
        conn: &Connection,
        record_id: RecordId,
        entries: &mut [ChangeEntry],
    ) -> Result<()> {
        for entry in entries.iter_mut().filter(|e| e.blob.is_none()) {
            let Some(meta) = entry.file.as_ref() else {
                continue;
            };
            if ledger::file_by_name(conn, &meta.filename)?.is_none() {
                entry.blob = self
                    .host
                    .file_bytes(record_id, entry.field_id, &meta.filename);
            }
        }
        Ok(())
    }

    /// Rewind a record's tracked fields in memory
    ///
    /// Untracked records and untracked fields are never touched. When no
    /// revision qualifies the record keeps its current state and the
    /// outcome's `revision` is `None`. [`SnapshotTarget::Live`] rewinds to
    /// the head revision, which brings an earlier rewind back to live.
    ///
    /// # Errors
    ///
    /// - `InvalidPointInTime` never surfaces here; parse errors happen when
    ///   the [`SnapshotTarget`] is built
    /// - `ConsistencyError` / `Serialization` when stored rows cannot be decoded
    /// - `StorageFailure` on database errors
    pub fn snapshot(
        &self,
        conn: &Connection,
        record: &mut Record,
        target: SnapshotTarget,
    ) -> Result<SnapshotOutcome> {
        let ctx = RequestContext::new(OP_SNAPSHOT);
        let span = op_span(&ctx);
        let _guard = span.enter();
        let record_id = record.id;

        log_op_start!(OP_SNAPSHOT, record_id = record_id, snapshot_target = ?target);

        let outcome = self.snapshot_impl(conn, record, target).map_err(|e| {
            let e = e.with_request_id(ctx.request_id);
            log_op_error!(
                OP_SNAPSHOT,
                e.clone(),
                duration_ms = ctx.elapsed_ms(),
                record_id = record_id
            );
            e
        })?;

        log_op_end!(
            OP_SNAPSHOT,
            duration_ms = ctx.elapsed_ms(),
            record_id = record_id,
            revision_id = outcome.revision,
            nested_count = outcome.nested.len()
        );

        Ok(outcome)
    }

    fn snapshot_impl(
        &self,
        conn: &Connection,
        record: &mut Record,
        target: SnapshotTarget,
    ) -> Result<SnapshotOutcome> {
        let mut outcome = SnapshotOutcome::default();
        if !self.config.is_template_tracked(record.template_id) {
            tracing::debug!(record_id = record.id, "Record is not under version control");
            return Ok(outcome);
        }

        let revision = match target {
            SnapshotTarget::Live => ledger::latest_revision_at(conn, record.id, i64::MAX)?,
            SnapshotTarget::At(point) => {
                let at = point.resolve_millis(self.clock.now());
                ledger::latest_revision_at(conn, record.id, at)?
            }
            SnapshotTarget::Revision(id) => {
                ledger::revision_by_id(conn, id)?.filter(|r| r.record_id == record.id)
            }
        };
        let Some(revision) = revision else {
            tracing::debug!(
                record_id = record.id,
                err.code = ExErrorKind::NotFound.code(),
                "No qualifying revision, live state kept"
            );
            return Ok(outcome);
        };

        self.apply_revision(conn, record, &revision)?;
        outcome.revision = Some(revision.id);

        let nested_at = match (target, self.config.nested_snapshot) {
            (SnapshotTarget::Live, _) => Some(i64::MAX),
            (SnapshotTarget::Revision(_), NestedSnapshotPolicy::ParentPreviousRevision) => {
                ledger::revision_before(conn, &revision)?.map(|r| r.created_at)
            }
            _ => Some(revision.created_at),
        };
        if let Some(at) = nested_at {
            self.rewind_nested(conn, record, at, &mut outcome)?;
        }

        Ok(outcome)
    }

    fn rewind_nested(
        &self,
        conn: &Connection,
        parent: &mut Record,
        at: i64,
        outcome: &mut SnapshotOutcome,
    ) -> Result<()> {
        for child in parent.nested.iter_mut() {
            if self.config.is_template_tracked(child.template_id) {
                if let Some(revision) = ledger::latest_revision_at(conn, child.id, at)? {
                    self.apply_revision(conn, child, &revision)?;
                    outcome.nested.insert(child.id, revision.id);
                }
            }
            self.rewind_nested(conn, child, at, outcome)?;
        }
        Ok(())
    }

    fn apply_revision(&self, conn: &Connection, record: &mut Record, revision: &RevisionRow) -> Result<()> {
        let defs = self.tracked_defs(record.template_id);
        let rows = ledger::data_as_of(conn, record.id, None, Some(revision.id))?;
        let mut values = reconstruct_fields(&rows, &defs).map_err(|e| e.with_record_id(record.id))?;
        let with_history = ledger::fields_with_history(conn, record.id)?;

        for def in &defs {
            match values.remove(&def.id) {
                Some(value) => record.set(def.id, value),
                None if with_history.contains(&def.id) => {
                    record.set(def.id, FieldValue::empty(def.kind))
                }
                None => {}
            }
        }
        record.revision = Some(revision.id);
        Ok(())
    }

    /// Persist a snapshot as a new revision
    ///
    /// The record is rewound to `target` and saved through the normal save
    /// path; history is never rewritten. When no revision qualifies nothing
    /// is saved.
    pub fn revert(
        &self,
        conn: &mut Connection,
        record: &mut Record,
        target: SnapshotTarget,
        user: &ActingUser,
    ) -> Result<RevertOutcome> {
        let ctx = RequestContext::new(OP_REVERT);
        let span = op_span(&ctx);
        let _guard = span.enter();
        let record_id = record.id;

        log_op_start!(OP_REVERT, record_id = record_id, snapshot_target = ?target);

        let outcome = self.revert_impl(conn, record, target, user).map_err(|e| {
            let e = e.with_request_id(ctx.request_id);
            log_op_error!(
                OP_REVERT,
                e.clone(),
                duration_ms = ctx.elapsed_ms(),
                record_id = record_id
            );
            e
        })?;

        log_op_end!(
            OP_REVERT,
            duration_ms = ctx.elapsed_ms(),
            record_id = record_id,
            revision_id = outcome.saved.revision_for(record_id)
        );

        Ok(outcome)
    }

    fn revert_impl(
        &self,
        conn: &mut Connection,
        record: &mut Record,
        target: SnapshotTarget,
        user: &ActingUser,
    ) -> Result<RevertOutcome> {
        let live = record.clone();
        let snapshot = self.snapshot_impl(conn, record, target)?;
        if snapshot.revision.is_none() {
            return Ok(RevertOutcome {
                snapshot,
                saved: SaveOutcome::default(),
            });
        }
        let saved = self.save_impl(conn, record, Some(&live), user)?;
        Ok(RevertOutcome { snapshot, saved })
    }

    /// Highest revision id owned by the record
    pub fn revision_number(&self, conn: &Connection, record_id: RecordId) -> Result<Option<RevisionId>> {
        ledger::revision_number(conn, record_id)
    }

    /// Revisions of a record, newest first
    pub fn history(&self, conn: &Connection, record_id: RecordId) -> Result<Vec<RevisionSummary>> {
        ledger::history(conn, record_id)
    }

    /// Bytes of a stored file
    pub fn read_blob(&self, conn: &Connection, filename: &str) -> Result<Vec<u8>> {
        if ledger::file_by_name(conn, filename)?.is_none() {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("read_blob")
                .with_message(format!("No stored file named {}", filename)));
        }
        self.blobs.read(filename)
    }

    /// Scan the ledger and blob store for orphans; reported, never repaired
    pub fn check_consistency(&self, conn: &Connection) -> Result<ConsistencyReport> {
        let report = integrity::check_with_blobs(conn, self.blobs)?;
        if !report.is_clean() {
            tracing::warn!(
                problems = report.problem_count(),
                err.code = ExErrorKind::ConsistencyError.code(),
                "Ledger has orphaned rows"
            );
        }
        Ok(report)
    }

    /// Tracked ids the host no longer knows, as configuration warnings
    pub fn validate_config(&self) -> Vec<ExError> {
        self.config.validate_against(
            |template_id| self.host.template_exists(template_id),
            |field_id| self.host.field(field_id).is_some(),
        )
    }
}
