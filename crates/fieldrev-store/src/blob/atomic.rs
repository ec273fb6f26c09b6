//! Atomic write primitives
//!
//! Writes go to a uniquely named temp file beside the target and are renamed
//! into place, so readers never see a partial blob.

#![allow(clippy::result_large_err)]

use crate::errors::{io_error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn temp_path_for(target_path: &Path) -> PathBuf {
    let name = target_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target_path.with_file_name(format!(".{}.{}.tmp", name, Uuid::now_v7()))
}

/// Atomically write bytes to a file
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_blob_dir", e))?;
    }

    let temp_path = temp_path_for(target_path);
    if let Err(e) = fs::write(&temp_path, content) {
        let _ = fs::remove_file(&temp_path);
        return Err(io_error("write_blob_temp", e));
    }

    fs::rename(&temp_path, target_path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        io_error("rename_blob_temp", e)
    })?;

    Ok(())
}
