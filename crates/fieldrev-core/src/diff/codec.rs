//! Property keys and per-kind value encoding.

use crate::errors::VcError;
use crate::model::{FieldId, FileItem, LanguageId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Property of a data row within its field
///
/// Text forms are `data`, `data<language_id>` and `<index>.data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKey {
    /// Scalar value, default language, or the empty-list marker
    Data,
    Language(LanguageId),
    Index(usize),
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Data => f.write_str("data"),
            PropertyKey::Language(id) => write!(f, "data{}", id),
            PropertyKey::Index(i) => write!(f, "{}.data", i),
        }
    }
}

impl FromStr for PropertyKey {
    type Err = VcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || VcError::MalformedProperty {
            property: s.to_string(),
        };

        if s == "data" {
            return Ok(PropertyKey::Data);
        }
        if let Some(index) = s.strip_suffix(".data") {
            return index
                .parse::<usize>()
                .map(PropertyKey::Index)
                .map_err(|_| malformed());
        }
        if let Some(language) = s.strip_prefix("data") {
            return language
                .parse::<LanguageId>()
                .map(PropertyKey::Language)
                .map_err(|_| malformed());
        }
        Err(malformed())
    }
}

/// JSON payload of a file data row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileData {
    pub filename: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub tags: String,
}

impl FileData {
    pub fn from_item(item: &FileItem) -> Self {
        Self {
            filename: item.filename.clone(),
            description: item.description.clone(),
            modified: item.modified,
            created: item.created,
            tags: item.tags.clone(),
        }
    }

    pub fn into_item(self, mime_type: String, size: u64) -> FileItem {
        FileItem {
            filename: self.filename,
            description: self.description,
            created: self.created,
            modified: self.modified,
            tags: self.tags,
            mime_type,
            size,
            upload: None,
        }
    }
}

pub fn encode_file(field_id: FieldId, item: &FileItem) -> Result<String, VcError> {
    serde_json::to_string(&FileData::from_item(item)).map_err(|e| VcError::ValueDecode {
        field_id,
        property: item.filename.clone(),
        reason: e.to_string(),
    })
}

pub fn decode_file(field_id: FieldId, property: &str, value: &str) -> Result<FileData, VcError> {
    serde_json::from_str(value).map_err(|e| VcError::ValueDecode {
        field_id,
        property: property.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_key_text_forms() {
        assert_eq!(PropertyKey::Data.to_string(), "data");
        assert_eq!(PropertyKey::Language(1010).to_string(), "data1010");
        assert_eq!(PropertyKey::Index(2).to_string(), "2.data");

        assert_eq!("data".parse::<PropertyKey>().unwrap(), PropertyKey::Data);
        assert_eq!(
            "data1010".parse::<PropertyKey>().unwrap(),
            PropertyKey::Language(1010)
        );
        assert_eq!("12.data".parse::<PropertyKey>().unwrap(), PropertyKey::Index(12));
    }

    #[test]
    fn test_malformed_property_keys() {
        for bad in ["", "datax", "x.data", "-1.data", "value", "data.1"] {
            assert!(
                matches!(
                    bad.parse::<PropertyKey>(),
                    Err(VcError::MalformedProperty { .. })
                ),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_file_data_json_shape() {
        let mut item = FileItem::upload("a.png", vec![1], "image/png").with_description("cover");
        item.filename = "abc.png".to_string();
        item.created = 5;
        item.modified = 6;

        let json = encode_file(1, &item).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["filename"], "abc.png");
        assert_eq!(value["description"], "cover");
        assert_eq!(value["created"], 5);
        assert_eq!(value["modified"], 6);
        assert_eq!(value["tags"], "");

        let back = decode_file(1, "0.data", &json)
            .unwrap()
            .into_item("image/png".to_string(), 1);
        assert_eq!(back.filename, "abc.png");
        assert!(back.upload.is_none());
    }

    #[test]
    fn test_decode_file_rejects_garbage() {
        let err = decode_file(7, "0.data", "not json").unwrap_err();
        assert!(matches!(err, VcError::ValueDecode { field_id: 7, .. }));
    }
}
