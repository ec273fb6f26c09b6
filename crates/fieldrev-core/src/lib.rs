//! fieldrev core - value model and pure algorithms for field-level version control
//!
//! This crate holds everything that does not touch storage:
//! - Field value model (scalar, multi-language, multi-value, file lists) and records
//! - Tracking configuration
//! - Diff engine deciding which data rows a save produces
//! - Snapshot reconstruction from stored data rows
//! - Blob naming rules for uploaded files
//! - Error and logging facilities shared by the store and engine crates

pub mod blob_naming;
pub mod config;
pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod snapshot;

pub use fieldrev_core_types as core_types;

// Re-export commonly used types
pub use config::{CleanupMethod, EmptyRevisionPolicy, NestedSnapshotPolicy, TrackingConfig};
pub use errors::{ExError, ExErrorKind, Result, VcError};
pub use model::{
    ActingUser, FieldDef, FieldId, FieldKind, FieldValue, FileItem, LanguageId, LanguageValues, Record,
    RecordId, RevisionId, TemplateId, Upload, UserId,
};
pub use snapshot::{PointInTime, SnapshotTarget};
