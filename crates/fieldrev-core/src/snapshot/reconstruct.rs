//! Field reconstruction from stored data rows.
//!
//! Rows arrive in ledger order (revision creation time, then revision id).
//! Per field, the last row per property wins. List-valued fields are cut to
//! the indices written by the latest revision touching the field, since a
//! changed list always rewrites every index.

#![allow(clippy::result_large_err)]

use crate::diff::codec::{decode_file, PropertyKey};
use crate::diff::model::FileMeta;
use crate::errors::{ExError, Result, VcError};
use crate::model::{FieldDef, FieldId, FieldKind, FieldValue, LanguageValues, RevisionId};
use std::collections::BTreeMap;

/// A data row as read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub revision_id: RevisionId,
    pub field_id: FieldId,
    pub property: String,
    pub value: String,
    pub file: Option<FileMeta>,
}

#[derive(Default)]
struct FieldRows<'a> {
    /// property -> last row
    latest: BTreeMap<PropertyKey, &'a StoredRow>,
    last_revision: Option<RevisionId>,
    /// properties written by `last_revision`
    last_props: Vec<PropertyKey>,
}

/// Rebuild the values of `defs` from ordered rows
///
/// Fields without rows are absent from the result. Rows of fields not in
/// `defs` are ignored.
///
/// # Errors
///
/// - `ConsistencyError` for a property key that is malformed or does not fit
///   the field's kind
/// - `Serialization` for a file row whose JSON cannot be decoded
pub fn reconstruct_fields(
    rows: &[StoredRow],
    defs: &[FieldDef],
) -> Result<BTreeMap<FieldId, FieldValue>> {
    let kinds: BTreeMap<FieldId, FieldKind> = defs.iter().map(|d| (d.id, d.kind)).collect();
    let mut grouped: BTreeMap<FieldId, FieldRows<'_>> = BTreeMap::new();

    for row in rows {
        if !kinds.contains_key(&row.field_id) {
            continue;
        }
        let key: PropertyKey = row.property.parse().map_err(|e: VcError| {
            ExError::from(e)
                .with_op("reconstruct_fields")
                .with_field_id(row.field_id)
                .with_revision_id(row.revision_id)
        })?;
        let entry = grouped.entry(row.field_id).or_default();
        if entry.last_revision != Some(row.revision_id) {
            entry.last_revision = Some(row.revision_id);
            entry.last_props.clear();
        }
        entry.last_props.push(key);
        entry.latest.insert(key, row);
    }

    let mut values = BTreeMap::new();
    for (field_id, rows) in grouped {
        let kind = kinds[&field_id];
        let value = match kind {
            FieldKind::Scalar => rebuild_scalar(field_id, &rows)?,
            FieldKind::MultiLanguage => rebuild_languages(field_id, &rows)?,
            FieldKind::MultiValue => FieldValue::MultiValue(
                list_rows(field_id, &rows)?
                    .into_iter()
                    .map(|r| r.value.clone())
                    .collect(),
            ),
            FieldKind::File => {
                let mut items = Vec::new();
                for row in list_rows(field_id, &rows)? {
                    let (mime_type, size) = row
                        .file
                        .as_ref()
                        .map(|f| (f.mime_type.clone(), f.size))
                        .unwrap_or_default();
                    let data = decode_file(field_id, &row.property, &row.value).map_err(|e| {
                        ExError::from(e)
                            .with_op("reconstruct_fields")
                            .with_revision_id(row.revision_id)
                    })?;
                    items.push(data.into_item(mime_type, size));
                }
                FieldValue::Files(items)
            }
        };
        values.insert(field_id, value);
    }
    Ok(values)
}

fn misplaced(field_id: FieldId, row: &StoredRow) -> ExError {
    ExError::from(VcError::MalformedProperty {
        property: row.property.clone(),
    })
    .with_op("reconstruct_fields")
    .with_field_id(field_id)
    .with_revision_id(row.revision_id)
}

fn rebuild_scalar(field_id: FieldId, rows: &FieldRows<'_>) -> Result<FieldValue> {
    if let Some((_, row)) = rows.latest.iter().find(|(k, _)| **k != PropertyKey::Data) {
        return Err(misplaced(field_id, row));
    }
    Ok(FieldValue::Scalar(
        rows.latest
            .get(&PropertyKey::Data)
            .map(|r| r.value.clone())
            .unwrap_or_default(),
    ))
}

fn rebuild_languages(field_id: FieldId, rows: &FieldRows<'_>) -> Result<FieldValue> {
    let mut values = LanguageValues::default();
    for (key, row) in &rows.latest {
        match key {
            PropertyKey::Data => values.default = row.value.clone(),
            PropertyKey::Language(id) => {
                if !row.value.is_empty() {
                    values.translations.insert(*id, row.value.clone());
                }
            }
            PropertyKey::Index(_) => return Err(misplaced(field_id, row)),
        }
    }
    Ok(FieldValue::MultiLanguage(values))
}

/// Rows making up the current list, in index order
fn list_rows<'a>(field_id: FieldId, rows: &FieldRows<'a>) -> Result<Vec<&'a StoredRow>> {
    if let Some((_, row)) = rows
        .latest
        .iter()
        .find(|(k, _)| matches!(k, PropertyKey::Language(_)))
    {
        return Err(misplaced(field_id, row));
    }
    // an empty-list marker in the latest revision clears the list
    if rows.last_props.contains(&PropertyKey::Data) {
        return Ok(Vec::new());
    }
    let len = rows
        .last_props
        .iter()
        .filter_map(|k| match k {
            PropertyKey::Index(i) => Some(i + 1),
            _ => None,
        })
        .max()
        .unwrap_or(0);
    Ok((0..len)
        .filter_map(|i| rows.latest.get(&PropertyKey::Index(i)).copied())
        .collect())
}
