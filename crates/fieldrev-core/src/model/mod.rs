//! Value model for tracked records
//!
//! Identifiers are the host's integer keys. Field values form a closed set of
//! variants dispatched by the field's declared [`FieldKind`].

pub mod field;
pub mod record;

pub use field::{FieldDef, FieldKind, FieldValue, FileItem, LanguageValues, Upload};
pub use record::Record;

/// Host record (page) identifier
pub type RecordId = i64;
/// Host field identifier
pub type FieldId = i64;
/// Host template identifier
pub type TemplateId = i64;
/// Host language identifier
pub type LanguageId = i64;
/// Ledger revision identifier (global, monotonic)
pub type RevisionId = i64;
/// Host user identifier
pub type UserId = i64;

/// User a save is attributed to; the name is denormalized into each revision
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ActingUser {
    pub id: UserId,
    pub name: String,
}

impl ActingUser {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
