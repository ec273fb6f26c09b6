//! Blob store for uploaded files
//!
//! Provides:
//! - Filesystem storage keyed by the stored (content-derived) filename
//! - Atomic writes and collision detection
//! - Sharding by the first 2 characters of the name

mod atomic;
mod fs_store;
mod sharding;

pub use fs_store::BlobStore;
pub use sharding::shard_path;
