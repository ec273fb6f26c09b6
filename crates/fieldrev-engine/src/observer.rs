//! Host hook surface
//!
//! The host calls these synchronously from its own save and delete paths.
//! [`VersionControl`] implements the trait; hosts that want to add their own
//! reactions can wrap it.

#![allow(clippy::result_large_err)]

use crate::version_control::{SaveOutcome, VersionControl};
use fieldrev_core::{ActingUser, FieldId, Record, RecordId, TemplateId};
use fieldrev_store::errors::Result;
use fieldrev_store::ledger::CleanupOutcome;
use rusqlite::Connection;

pub trait RecordObserver {
    /// After the host accepted a record save
    fn on_saved(
        &self,
        conn: &mut Connection,
        record: &mut Record,
        previous: Option<&Record>,
        user: &ActingUser,
    ) -> Result<SaveOutcome>;

    /// After a record was deleted
    fn on_deleted(&self, conn: &mut Connection, record_id: RecordId) -> Result<CleanupOutcome>;

    /// After a field was deleted from the schema
    fn on_field_deleted(&self, conn: &mut Connection, field_id: FieldId) -> Result<CleanupOutcome>;

    /// After a field was removed from a template's fieldgroup
    fn on_field_removed(
        &self,
        conn: &mut Connection,
        template_id: TemplateId,
        field_id: FieldId,
    ) -> Result<CleanupOutcome>;

    /// After a record's template changed
    fn on_template_changed(
        &self,
        conn: &mut Connection,
        record_id: RecordId,
        new_template_id: TemplateId,
    ) -> Result<CleanupOutcome>;
}

impl RecordObserver for VersionControl<'_> {
    fn on_saved(
        &self,
        conn: &mut Connection,
        record: &mut Record,
        previous: Option<&Record>,
        user: &ActingUser,
    ) -> Result<SaveOutcome> {
        self.save(conn, record, previous, user)
    }

    fn on_deleted(&self, conn: &mut Connection, record_id: RecordId) -> Result<CleanupOutcome> {
        self.cleanup().on_deleted(conn, record_id)
    }

    fn on_field_deleted(&self, conn: &mut Connection, field_id: FieldId) -> Result<CleanupOutcome> {
        self.cleanup().on_field_deleted(conn, field_id)
    }

    fn on_field_removed(
        &self,
        conn: &mut Connection,
        template_id: TemplateId,
        field_id: FieldId,
    ) -> Result<CleanupOutcome> {
        self.cleanup().on_field_removed(conn, template_id, field_id)
    }

    fn on_template_changed(
        &self,
        conn: &mut Connection,
        record_id: RecordId,
        new_template_id: TemplateId,
    ) -> Result<CleanupOutcome> {
        self.cleanup()
            .on_template_changed(conn, record_id, new_template_id)
    }
}
