//! Shared helpers for fieldrev-core integration tests

#![allow(dead_code)]

use fieldrev_core::diff::ChangeEntry;
use fieldrev_core::snapshot::StoredRow;
use fieldrev_core::{FieldDef, FieldKind, RevisionId};

pub const TITLE: i64 = 1;
pub const SUMMARY: i64 = 2;
pub const TAGS: i64 = 3;
pub const IMAGES: i64 = 4;

pub fn tracked_defs() -> Vec<FieldDef> {
    vec![
        FieldDef::new(TITLE, "title", FieldKind::Scalar),
        FieldDef::new(SUMMARY, "summary", FieldKind::MultiLanguage),
        FieldDef::new(TAGS, "tags", FieldKind::MultiValue),
        FieldDef::new(IMAGES, "images", FieldKind::File),
    ]
}

/// Turn diff output into the rows a ledger would hand back
pub fn rows_for(revision_id: RevisionId, entries: &[ChangeEntry]) -> Vec<StoredRow> {
    entries
        .iter()
        .map(|e| StoredRow {
            revision_id,
            field_id: e.field_id,
            property: e.property.to_string(),
            value: e.value.clone(),
            file: e.file.clone(),
        })
        .collect()
}
