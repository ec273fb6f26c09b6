//! Host interfaces
//!
//! The engine reads the host's schema through [`HostAccessor`] and never
//! writes to it. Time comes from a [`Clock`] so revision stamps can be
//! controlled in tests.

use chrono::{DateTime, Utc};
use fieldrev_core::{FieldDef, FieldId, RecordId, TemplateId};

/// Read-only view of the host's schema and files
pub trait HostAccessor {
    /// Definition of a field, `None` when the host no longer knows it
    fn field(&self, field_id: FieldId) -> Option<FieldDef>;

    /// Field ids of a template's fieldgroup, `None` for an unknown template
    fn template_fields(&self, template_id: TemplateId) -> Option<Vec<FieldId>>;

    /// Records currently using a template
    fn records_using_template(&self, template_id: TemplateId) -> Vec<RecordId>;

    fn template_exists(&self, template_id: TemplateId) -> bool {
        self.template_fields(template_id).is_some()
    }

    /// Bytes of a file the host already holds, for items saved without an
    /// upload and not yet known to the ledger
    fn file_bytes(&self, _record_id: RecordId, _field_id: FieldId, _filename: &str) -> Option<Vec<u8>> {
        None
    }
}

/// Source of revision timestamps
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
