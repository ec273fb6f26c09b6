//! Snapshot targets and reconstruction.
//!
//! A snapshot rewinds a record's tracked fields in memory. The target is the
//! live state, a point in time, or a specific revision; the storage side
//! selects the qualifying rows and [`reconstruct_fields`] folds them back into
//! field values.

pub mod point_in_time;
pub mod reconstruct;

pub use point_in_time::PointInTime;
pub use reconstruct::{reconstruct_fields, StoredRow};

use crate::model::RevisionId;

/// What a snapshot rewinds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotTarget {
    /// Latest recorded state, undoing an earlier in-memory rewind
    #[default]
    Live,
    At(PointInTime),
    Revision(RevisionId),
}

impl SnapshotTarget {
    /// Build a target from the optional time / revision pair hosts pass in.
    /// A revision takes precedence over a time.
    pub fn from_parts(time: Option<PointInTime>, revision: Option<RevisionId>) -> Self {
        match (revision, time) {
            (Some(id), _) => SnapshotTarget::Revision(id),
            (None, Some(t)) => SnapshotTarget::At(t),
            (None, None) => SnapshotTarget::Live,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SnapshotTarget::Live)
    }
}
