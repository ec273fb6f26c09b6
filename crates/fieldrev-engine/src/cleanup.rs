//! Cleanup coordinator
//!
//! Reacts to host deletes and schema changes by removing ledger data that
//! can no longer be shown. Each handler is gated by the matching
//! [`CleanupMethod`]; a disabled handler leaves the ledger alone.
//!
//! The plain handlers open their own IMMEDIATE transaction and purge orphaned
//! blobs after commit. The `_tx` variants run inside a caller's transaction
//! so a cleanup commits or rolls back with the host's own delete; the caller
//! then hands the outcome to [`CleanupCoordinator::purge`].

#![allow(clippy::result_large_err)]

use crate::host::HostAccessor;
use crate::version_control::op_span;
use fieldrev_core::core_types::schema::{
    OP_CLEANUP_CHANGED_TEMPLATE, OP_CLEANUP_DELETED_FIELD, OP_CLEANUP_DELETED_RECORD,
    OP_CLEANUP_REMOVED_FIELD,
};
use fieldrev_core::core_types::RequestContext;
use fieldrev_core::errors::ExErrorKind;
use fieldrev_core::{
    log_op_end, log_op_error, log_op_start, CleanupMethod, FieldId, RecordId, TemplateId,
    TrackingConfig,
};
use fieldrev_store::errors::{from_rusqlite, Result};
use fieldrev_store::ledger::{self, CleanupOutcome};
use fieldrev_store::{db, BlobStore};
use rusqlite::{Connection, Transaction};
use std::collections::BTreeSet;

#[derive(Clone, Copy)]
pub struct CleanupCoordinator<'a> {
    config: &'a TrackingConfig,
    host: &'a dyn HostAccessor,
    blobs: &'a BlobStore,
}

impl<'a> CleanupCoordinator<'a> {
    pub fn new(config: &'a TrackingConfig, host: &'a dyn HostAccessor, blobs: &'a BlobStore) -> Self {
        Self {
            config,
            host,
            blobs,
        }
    }

    fn enabled(&self, method: CleanupMethod) -> bool {
        let enabled = self.config.cleanup_enabled(method);
        if !enabled {
            tracing::debug!(method = method.as_str(), "Cleanup method disabled, skipped");
        }
        enabled
    }

    /// Run `body` in its own transaction, then purge the blobs it orphaned
    fn run<F>(&self, op: &'static str, conn: &mut Connection, body: F) -> Result<CleanupOutcome>
    where
        F: FnOnce(&Transaction) -> Result<CleanupOutcome>,
    {
        let ctx = RequestContext::new(op);
        let span = op_span(&ctx);
        let _guard = span.enter();

        log_op_start!(op);

        let result = db::write_transaction(conn).and_then(|tx| {
            let outcome = body(&tx)?;
            tx.commit().map_err(from_rusqlite)?;
            Ok(outcome)
        });
        let outcome = result.map_err(|e| {
            let e = e.with_request_id(ctx.request_id);
            log_op_error!(op, e.clone(), duration_ms = ctx.elapsed_ms());
            e
        })?;

        let purged = self.purge(conn, &outcome);
        log_op_end!(
            op,
            duration_ms = ctx.elapsed_ms(),
            revisions_deleted = outcome.revisions_deleted,
            rows_deleted = outcome.rows_deleted,
            blobs_removed = purged
        );
        Ok(outcome)
    }

    /// Remove blobs orphaned by a committed cleanup; returns how many went
    ///
    /// Failures are logged, not returned: the ledger is already consistent
    /// and a leftover blob shows up in the consistency report.
    pub fn purge(&self, conn: &mut Connection, outcome: &CleanupOutcome) -> usize {
        if outcome.orphaned_files.is_empty() {
            return 0;
        }
        match ledger::purge_blobs(conn, self.blobs, &outcome.orphaned_files) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(
                    err.code = e.code(),
                    blob_count = outcome.orphaned_files.len(),
                    "Could not purge orphaned blobs"
                );
                0
            }
        }
    }

    /// A record was deleted: drop its whole history
    pub fn on_deleted(&self, conn: &mut Connection, record_id: RecordId) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::DeletedPages) {
            return Ok(CleanupOutcome::default());
        }
        self.run(OP_CLEANUP_DELETED_RECORD, conn, |tx| {
            self.deleted_in(tx, record_id)
        })
    }

    pub fn on_deleted_tx(&self, tx: &Transaction, record_id: RecordId) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::DeletedPages) {
            return Ok(CleanupOutcome::default());
        }
        self.deleted_in(tx, record_id)
    }

    fn deleted_in(&self, tx: &Transaction, record_id: RecordId) -> Result<CleanupOutcome> {
        ledger::delete_revisions_for_record(tx, record_id)
    }

    /// A field was deleted from the host schema: drop its rows everywhere
    pub fn on_field_deleted(&self, conn: &mut Connection, field_id: FieldId) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::DeletedFields) {
            return Ok(CleanupOutcome::default());
        }
        self.run(OP_CLEANUP_DELETED_FIELD, conn, |tx| {
            self.field_deleted_in(tx, field_id)
        })
    }

    pub fn on_field_deleted_tx(&self, tx: &Transaction, field_id: FieldId) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::DeletedFields) {
            return Ok(CleanupOutcome::default());
        }
        self.field_deleted_in(tx, field_id)
    }

    fn field_deleted_in(&self, tx: &Transaction, field_id: FieldId) -> Result<CleanupOutcome> {
        ledger::delete_data_for_field(tx, field_id, self.config.empty_revisions)
    }

    /// A field was removed from a template's fieldgroup: drop its rows for
    /// every record using that template
    pub fn on_field_removed(
        &self,
        conn: &mut Connection,
        template_id: TemplateId,
        field_id: FieldId,
    ) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::RemovedFieldgroupFields) {
            return Ok(CleanupOutcome::default());
        }
        self.run(OP_CLEANUP_REMOVED_FIELD, conn, |tx| {
            self.field_removed_in(tx, template_id, field_id)
        })
    }

    pub fn on_field_removed_tx(
        &self,
        tx: &Transaction,
        template_id: TemplateId,
        field_id: FieldId,
    ) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::RemovedFieldgroupFields) {
            return Ok(CleanupOutcome::default());
        }
        self.field_removed_in(tx, template_id, field_id)
    }

    fn field_removed_in(
        &self,
        tx: &Transaction,
        template_id: TemplateId,
        field_id: FieldId,
    ) -> Result<CleanupOutcome> {
        let records = self.host.records_using_template(template_id);
        ledger::delete_data_for_field_in_records(tx, field_id, &records, self.config.empty_revisions)
    }

    /// A record moved to another template: drop rows of fields the new
    /// template does not have
    pub fn on_template_changed(
        &self,
        conn: &mut Connection,
        record_id: RecordId,
        new_template_id: TemplateId,
    ) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::ChangedTemplate) {
            return Ok(CleanupOutcome::default());
        }
        self.run(OP_CLEANUP_CHANGED_TEMPLATE, conn, |tx| {
            self.template_changed_in(tx, record_id, new_template_id)
        })
    }

    pub fn on_template_changed_tx(
        &self,
        tx: &Transaction,
        record_id: RecordId,
        new_template_id: TemplateId,
    ) -> Result<CleanupOutcome> {
        if !self.enabled(CleanupMethod::ChangedTemplate) {
            return Ok(CleanupOutcome::default());
        }
        self.template_changed_in(tx, record_id, new_template_id)
    }

    fn template_changed_in(
        &self,
        tx: &Transaction,
        record_id: RecordId,
        new_template_id: TemplateId,
    ) -> Result<CleanupOutcome> {
        let Some(fieldgroup) = self.host.template_fields(new_template_id) else {
            tracing::warn!(
                record_id,
                template_id = new_template_id,
                err.code = ExErrorKind::ConfigurationError.code(),
                "New template is unknown to the host, cleanup skipped"
            );
            return Ok(CleanupOutcome::default());
        };
        let kept: BTreeSet<FieldId> = fieldgroup.into_iter().collect();
        let mut outcome = CleanupOutcome::default();
        for field_id in ledger::fields_with_history(tx, record_id)? {
            if !kept.contains(&field_id) {
                outcome.merge(ledger::delete_data_for_field_in_records(
                    tx,
                    field_id,
                    &[record_id],
                    self.config.empty_revisions,
                )?);
            }
        }
        Ok(outcome)
    }
}
