//! fieldrev engine - version-control orchestration
//!
//! Coordinates the pure algorithms in `fieldrev-core` with the ledger in
//! `fieldrev-store`:
//! - `version_control`: save, snapshot, revert, revision numbers, history
//! - `cleanup`: reacting to host deletes and schema changes
//! - `observer`: the hook surface a host calls synchronously
//! - `host`: the narrow read-only view of the host the engine needs

pub mod cleanup;
pub mod host;
pub mod observer;
pub mod version_control;

pub use cleanup::CleanupCoordinator;
pub use host::{Clock, HostAccessor, SystemClock};
pub use observer::RecordObserver;
pub use version_control::{
    RevertOutcome, SaveOutcome, SavedRevision, SnapshotOutcome, VersionControl,
};
