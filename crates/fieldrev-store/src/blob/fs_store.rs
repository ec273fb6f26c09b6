//! Filesystem blob store
//!
//! Blobs are addressed by their stored filename, which already embeds the
//! SHA-1 of the content. Reference counting lives in the ledger's
//! `files`/`data_files` tables; this type only moves bytes.

#![allow(clippy::result_large_err)]

use crate::blob::atomic::atomic_write;
use crate::blob::sharding::shard_path;
use crate::errors::{blob_collision, blob_missing, io_error, Result};
use fieldrev_core::errors::{ExError, ExErrorKind};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Filesystem-backed blob store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create a blob store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Physical location of a stored name
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
            || name.contains("..")
        {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("blob_path")
                .with_message(format!("Invalid stored filename: {:?}", name)));
        }
        Ok(shard_path(&self.root, name))
    }

    /// Store bytes under a name
    ///
    /// Returns `true` when the blob was newly written. Writing identical
    /// bytes again is a no-op; different bytes under an existing name fail
    /// with `BlobCollision`.
    pub fn write(&self, name: &str, content: &[u8]) -> Result<bool> {
        let target_path = self.path_for(name)?;

        match fs::read(&target_path) {
            Ok(existing) if existing == content => return Ok(false),
            Ok(_) => return Err(blob_collision(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_error("read_blob", e)),
        }

        atomic_write(&target_path, content)?;
        tracing::debug!(filename = name, size = content.len(), "Blob written");
        Ok(true)
    }

    /// Read the bytes stored under a name
    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                blob_missing(name)
            } else {
                io_error("read_blob", e)
            }
        })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Remove a blob; returns `false` when it was already absent
    pub fn remove(&self, name: &str) -> Result<bool> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(filename = name, "Blob removed");
                if let Some(shard) = path.parent() {
                    // fails harmlessly while the shard still holds blobs
                    let _ = fs::remove_dir(shard);
                }
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error("remove_blob", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_store() -> (BlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = BlobStore::new(temp_dir.path());
        (store, temp_dir)
    }

    #[test]
    fn test_write_read_roundtrip() {
        let (store, _dir) = setup_test_store();
        assert!(store.write("abcd.png", b"image").unwrap());
        assert_eq!(store.read("abcd.png").unwrap(), b"image");
        assert!(store.exists("abcd.png"));
    }

    #[test]
    fn test_idempotent_write() {
        let (store, _dir) = setup_test_store();
        assert!(store.write("abcd.png", b"image").unwrap());
        assert!(!store.write("abcd.png", b"image").unwrap());
    }

    #[test]
    fn test_collision_detected() {
        let (store, _dir) = setup_test_store();
        store.write("abcd.png", b"image").unwrap();
        let err = store.write("abcd.png", b"other").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::BlobCollision);
    }

    #[test]
    fn test_read_missing() {
        let (store, _dir) = setup_test_store();
        let err = store.read("ffff.png").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MissingBlob);
    }

    #[test]
    fn test_remove() {
        let (store, _dir) = setup_test_store();
        store.write("abcd.png", b"image").unwrap();
        assert!(store.remove("abcd.png").unwrap());
        assert!(!store.remove("abcd.png").unwrap());
        assert!(!store.exists("abcd.png"));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let (store, _dir) = setup_test_store();
        for bad in ["", "../x.png", "a/b.png", ".hidden"] {
            let err = store.write(bad, b"x").unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidInput, "{:?}", bad);
        }
    }
}
