use crate::model::{FieldDef, FieldId, FieldValue, RecordId, RevisionId, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A host record (page) as seen by the version-control engine
///
/// Nested records (repeater items and the like) are ordinary records with
/// their own history. They are carried in `nested` only so that a snapshot
/// of the parent can rewind them in the same pass; `parent_id` records the
/// association without implying ownership of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub template_id: TemplateId,
    #[serde(default)]
    pub parent_id: Option<RecordId>,
    #[serde(default)]
    pub values: BTreeMap<FieldId, FieldValue>,
    #[serde(default)]
    pub nested: Vec<Record>,
    /// Revision the in-memory state corresponds to, set by snapshot and save
    #[serde(default)]
    pub revision: Option<RevisionId>,
}

impl Record {
    pub fn new(id: RecordId, template_id: TemplateId) -> Self {
        Self {
            id,
            template_id,
            parent_id: None,
            values: BTreeMap::new(),
            nested: Vec::new(),
            revision: None,
        }
    }

    pub fn with_value(mut self, field_id: FieldId, value: FieldValue) -> Self {
        self.values.insert(field_id, value);
        self
    }

    pub fn with_nested(mut self, mut child: Record) -> Self {
        child.parent_id = Some(self.id);
        self.nested.push(child);
        self
    }

    pub fn get(&self, field_id: FieldId) -> Option<&FieldValue> {
        self.values.get(&field_id)
    }

    pub fn get_mut(&mut self, field_id: FieldId) -> Option<&mut FieldValue> {
        self.values.get_mut(&field_id)
    }

    pub fn set(&mut self, field_id: FieldId, value: FieldValue) {
        self.values.insert(field_id, value);
    }

    /// Current value of a field, or the kind's empty value when unset
    pub fn value_or_empty(&self, def: &FieldDef) -> FieldValue {
        self.values
            .get(&def.id)
            .cloned()
            .unwrap_or_else(|| FieldValue::empty(def.kind))
    }

    /// Scalar text of a field, empty when unset or not scalar
    pub fn text(&self, field_id: FieldId) -> &str {
        self.values
            .get(&field_id)
            .and_then(|v| v.as_scalar())
            .unwrap_or("")
    }

    pub fn nested_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.nested.iter_mut().find(|r| r.id == id)
    }
}
