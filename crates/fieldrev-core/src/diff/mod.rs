//! Field diff engine.
//!
//! Compares a record's new values with the last recorded state of each
//! tracked field and produces the data rows a save has to append.
//!
//! ## Entry point
//!
//! ```ignore
//! use fieldrev_core::diff::compute_changes;
//!
//! let entries = compute_changes(&record, &previous, &tracked_defs)?;
//! if entries.is_empty() {
//!     // nothing to record, no revision
//! }
//! ```
//!
//! ## Row encoding
//!
//! - Scalar: one `data` row with the text value.
//! - Multi-language: `data` for the default language, `data<language_id>` for
//!   every other language whose value changed.
//! - Multi-value and file lists: `<index>.data` for every index of the new
//!   list whenever the list changed; an emptied list is a single empty `data`
//!   row. File rows hold a JSON object and carry filename, mime type and size
//!   separately.

pub mod codec;
pub mod engine;
pub mod model;

pub use codec::{FileData, PropertyKey};
pub use engine::compute_changes;
pub use model::{ChangeEntry, FileMeta};
