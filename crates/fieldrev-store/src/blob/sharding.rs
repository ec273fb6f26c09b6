//! Sharding for the blob store
//!
//! Blobs live in subdirectories named after the first 2 characters of the
//! stored filename so that no single directory grows unbounded.

use std::path::{Path, PathBuf};

/// For name "abc123.png", returns "<root>/ab/abc123.png"
pub fn shard_path(root: &Path, name: &str) -> PathBuf {
    let shard: String = name.chars().take(2).collect();
    root.join(shard).join(name)
}
