use crate::model::{FieldId, LanguageId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared kind of a field, as reported by the host schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Single text value (text, textarea, checkbox, page reference, ...)
    Scalar,
    /// Text with one value per language
    MultiLanguage,
    /// Ordered list of text values
    MultiValue,
    /// Ordered list of uploaded files
    File,
}

/// Field definition read from the host schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: FieldId,
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(id: FieldId, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
        }
    }
}

/// Per-language text values; the default language is kept apart from the
/// translations because it is stored under the bare `data` property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageValues {
    pub default: String,
    pub translations: BTreeMap<LanguageId, String>,
}

impl LanguageValues {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            translations: BTreeMap::new(),
        }
    }

    /// Value for a language; `None` selects the default language.
    /// Languages without a translation read as empty.
    pub fn get(&self, language: Option<LanguageId>) -> &str {
        match language {
            None => &self.default,
            Some(id) => self.translations.get(&id).map(|s| s.as_str()).unwrap_or(""),
        }
    }

    pub fn set(&mut self, language: Option<LanguageId>, value: impl Into<String>) {
        match language {
            None => self.default = value.into(),
            Some(id) => {
                self.translations.insert(id, value.into());
            }
        }
    }

    pub fn with_translation(mut self, language: LanguageId, value: impl Into<String>) -> Self {
        self.translations.insert(language, value.into());
        self
    }
}

impl std::fmt::Display for LanguageValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.default)
    }
}

/// Raw bytes of a file that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Name of the file as uploaded; only its extension is kept
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// One item of a file field
///
/// `filename` is the stored, content-derived name. Items carrying an
/// [`Upload`] get their filename assigned by
/// [`crate::blob_naming::assign_stored_names`] before diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub filename: String,
    #[serde(default)]
    pub description: String,
    /// Unix seconds
    #[serde(default)]
    pub created: i64,
    /// Unix seconds
    #[serde(default)]
    pub modified: i64,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(skip)]
    pub upload: Option<Upload>,
}

impl FileItem {
    /// A new file that still has to be named and stored
    pub fn upload(
        original_name: impl Into<String>,
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        let size = bytes.len() as u64;
        Self {
            filename: String::new(),
            description: String::new(),
            created: 0,
            modified: 0,
            tags: String::new(),
            mime_type: mime_type.into(),
            size,
            upload: Some(Upload {
                original_name: original_name.into(),
                bytes,
            }),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_pending_upload(&self) -> bool {
        self.upload.is_some()
    }
}

/// Value of a field on a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Scalar(String),
    MultiLanguage(LanguageValues),
    MultiValue(Vec<String>),
    Files(Vec<FileItem>),
}

impl FieldValue {
    /// Empty value for a kind; fields missing from a record read as this
    pub fn empty(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Scalar => FieldValue::Scalar(String::new()),
            FieldKind::MultiLanguage => FieldValue::MultiLanguage(LanguageValues::default()),
            FieldKind::MultiValue => FieldValue::MultiValue(Vec::new()),
            FieldKind::File => FieldValue::Files(Vec::new()),
        }
    }

    pub fn scalar(value: impl Into<String>) -> Self {
        FieldValue::Scalar(value.into())
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Scalar(_) => FieldKind::Scalar,
            FieldValue::MultiLanguage(_) => FieldKind::MultiLanguage,
            FieldValue::MultiValue(_) => FieldKind::MultiValue,
            FieldValue::Files(_) => FieldKind::File,
        }
    }

    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "scalar",
            FieldValue::MultiLanguage(_) => "multi_language",
            FieldValue::MultiValue(_) => "multi_value",
            FieldValue::Files(_) => "files",
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_languages(&self) -> Option<&LanguageValues> {
        match self {
            FieldValue::MultiLanguage(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::MultiValue(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_files(&self) -> Option<&[FileItem]> {
        match self {
            FieldValue::Files(v) => Some(v),
            _ => None,
        }
    }

    /// Stored filenames joined with `|`, the form hosts print file fields in
    pub fn file_names(&self) -> Option<String> {
        self.as_files().map(|items| {
            items
                .iter()
                .map(|i| i.filename.as_str())
                .collect::<Vec<_>>()
                .join("|")
        })
    }
}
