//! Change computation.
//!
//! The core entry point is [`compute_changes`], which compares a record with
//! the last recorded value of each tracked field and returns the data rows a
//! save appends.

#![allow(clippy::result_large_err)]

use crate::diff::codec::{encode_file, FileData, PropertyKey};
use crate::diff::model::{ChangeEntry, FileMeta};
use crate::errors::{ExError, ExErrorKind, Result, VcError};
use crate::model::{FieldDef, FieldId, FieldValue, FileItem, LanguageValues, Record};
use std::collections::{BTreeMap, BTreeSet};

/// Compute the data rows for a save
///
/// `previous` holds the last recorded value per field; fields missing from it
/// (or recorded under a different kind) compare against the kind's empty
/// value. Only fields in `tracked` are considered, in the given order.
///
/// # Errors
///
/// - `InvalidInput` when a record value disagrees with its field's declared
///   kind, or a file item has neither a stored filename nor an upload
/// - `Serialization` when a file item cannot be encoded
pub fn compute_changes(
    record: &Record,
    previous: &BTreeMap<FieldId, FieldValue>,
    tracked: &[FieldDef],
) -> Result<Vec<ChangeEntry>> {
    let mut entries = Vec::new();

    for def in tracked {
        let new = record.value_or_empty(def);
        if new.kind() != def.kind {
            return Err(ExError::from(VcError::KindMismatch {
                field_id: def.id,
                expected: def.kind,
                found: new.variant_name(),
            })
            .with_op("compute_changes")
            .with_record_id(record.id));
        }

        let old = previous
            .get(&def.id)
            .filter(|v| v.kind() == def.kind)
            .cloned()
            .unwrap_or_else(|| FieldValue::empty(def.kind));

        let before = entries.len();
        match (&new, &old) {
            (FieldValue::Scalar(n), FieldValue::Scalar(o)) => {
                if n != o {
                    entries.push(ChangeEntry::text(def.id, PropertyKey::Data, n.clone()));
                }
            }
            (FieldValue::MultiLanguage(n), FieldValue::MultiLanguage(o)) => {
                language_changes(def.id, n, o, &mut entries);
            }
            (FieldValue::MultiValue(n), FieldValue::MultiValue(o)) => {
                if n != o {
                    list_changes(def.id, n, &mut entries);
                }
            }
            (FieldValue::Files(n), FieldValue::Files(o)) => {
                file_changes(record, def.id, n, o, &mut entries)?;
            }
            _ => {}
        }

        if entries.len() > before {
            tracing::debug!(
                record_id = record.id,
                field_id = def.id,
                entry_count = entries.len() - before,
                "Field changed"
            );
        }
    }

    Ok(entries)
}

fn language_changes(
    field_id: FieldId,
    new: &LanguageValues,
    old: &LanguageValues,
    entries: &mut Vec<ChangeEntry>,
) {
    if new.default != old.default {
        entries.push(ChangeEntry::text(
            field_id,
            PropertyKey::Data,
            new.default.clone(),
        ));
    }

    let languages: BTreeSet<_> = new
        .translations
        .keys()
        .chain(old.translations.keys())
        .copied()
        .collect();
    for language in languages {
        let value = new.get(Some(language));
        if value != old.get(Some(language)) {
            entries.push(ChangeEntry::text(
                field_id,
                PropertyKey::Language(language),
                value,
            ));
        }
    }
}

fn list_changes(field_id: FieldId, new: &[String], entries: &mut Vec<ChangeEntry>) {
    if new.is_empty() {
        entries.push(ChangeEntry::text(field_id, PropertyKey::Data, ""));
        return;
    }
    for (index, value) in new.iter().enumerate() {
        entries.push(ChangeEntry::text(
            field_id,
            PropertyKey::Index(index),
            value.clone(),
        ));
    }
}

fn file_changes(
    record: &Record,
    field_id: FieldId,
    new: &[FileItem],
    old: &[FileItem],
    entries: &mut Vec<ChangeEntry>,
) -> Result<()> {
    if let Some(unnamed) = new.iter().find(|i| i.filename.is_empty()) {
        return Err(ExError::new(ExErrorKind::InvalidInput)
            .with_op("compute_changes")
            .with_record_id(record.id)
            .with_field_id(field_id)
            .with_message(if unnamed.upload.is_some() {
                "Pending upload has no stored filename"
            } else {
                "File item has no filename"
            }));
    }

    let changed = new.len() != old.len()
        || new.iter().zip(old).any(|(n, o)| {
            n.upload.is_some() || FileData::from_item(n) != FileData::from_item(o)
        });
    if !changed {
        return Ok(());
    }

    if new.is_empty() {
        entries.push(ChangeEntry::text(field_id, PropertyKey::Data, ""));
        return Ok(());
    }

    for (index, item) in new.iter().enumerate() {
        let value = encode_file(field_id, item).map_err(|e| {
            ExError::from(e)
                .with_op("compute_changes")
                .with_record_id(record.id)
        })?;
        entries.push(ChangeEntry {
            field_id,
            property: PropertyKey::Index(index),
            value,
            file: Some(FileMeta {
                filename: item.filename.clone(),
                mime_type: item.mime_type.clone(),
                size: item.size,
            }),
            blob: item.upload.as_ref().map(|u| u.bytes.clone()),
        });
    }
    Ok(())
}
