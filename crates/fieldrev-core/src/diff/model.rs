//! Diff output types.

use crate::diff::codec::PropertyKey;
use crate::model::FieldId;
use serde::{Deserialize, Serialize};

/// File metadata stored beside a file data row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileMeta {
    /// Stored, content-derived filename
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
}

/// One data row a save has to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub field_id: FieldId,
    pub property: PropertyKey,
    /// Serialized value; plain text, or JSON for file items
    pub value: String,
    pub file: Option<FileMeta>,
    /// Bytes of a pending upload, handed to the blob store
    pub blob: Option<Vec<u8>>,
}

impl ChangeEntry {
    pub fn text(field_id: FieldId, property: PropertyKey, value: impl Into<String>) -> Self {
        Self {
            field_id,
            property,
            value: value.into(),
            file: None,
            blob: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.file.is_some()
    }
}
