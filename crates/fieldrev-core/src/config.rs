//! Tracking configuration
//!
//! Decides which templates and fields are under version control and which
//! cleanup handlers run. Built once at startup (from YAML or through the
//! builder methods) and then passed by reference; it is never mutated while
//! requests are handled.
//!
//! ```yaml
//! schema_version: 0
//! tracked_templates: [44]
//! tracked_fields: [1, 76, 98]
//! cleanup_methods: [deleted_pages, deleted_fields]
//! empty_revisions: retain
//! nested_snapshot: parent_timestamp
//! ```

use crate::errors::{ExError, ExErrorKind, Result, VcError};
use crate::model::{FieldId, TemplateId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Host event kinds whose cleanup can be switched on or off
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupMethod {
    DeletedPages,
    DeletedFields,
    RemovedFieldgroupFields,
    ChangedTemplate,
}

impl CleanupMethod {
    pub const ALL: [CleanupMethod; 4] = [
        CleanupMethod::DeletedPages,
        CleanupMethod::DeletedFields,
        CleanupMethod::RemovedFieldgroupFields,
        CleanupMethod::ChangedTemplate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupMethod::DeletedPages => "deleted_pages",
            CleanupMethod::DeletedFields => "deleted_fields",
            CleanupMethod::RemovedFieldgroupFields => "removed_fieldgroup_fields",
            CleanupMethod::ChangedTemplate => "changed_template",
        }
    }
}

/// What happens to revisions left without data rows by a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRevisionPolicy {
    /// Keep them as numbering markers
    #[default]
    Retain,
    /// Delete them in the same transaction
    Prune,
}

/// How nested records are resolved when a parent snapshot is taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedSnapshotPolicy {
    /// Nested records use their latest revision at or before the parent's target
    #[default]
    ParentTimestamp,
    /// Revision-number snapshots resolve nested records against the parent's
    /// preceding revision timestamp
    ParentPreviousRevision,
}

fn default_cleanup_methods() -> BTreeSet<CleanupMethod> {
    CleanupMethod::ALL.into_iter().collect()
}

/// Process-wide tracking configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Config format version (must be 0)
    #[serde(default)]
    pub schema_version: u32,

    #[serde(default)]
    pub tracked_templates: BTreeSet<TemplateId>,

    #[serde(default)]
    pub tracked_fields: BTreeSet<FieldId>,

    #[serde(default = "default_cleanup_methods")]
    pub cleanup_methods: BTreeSet<CleanupMethod>,

    #[serde(default)]
    pub empty_revisions: EmptyRevisionPolicy,

    #[serde(default)]
    pub nested_snapshot: NestedSnapshotPolicy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            schema_version: 0,
            tracked_templates: BTreeSet::new(),
            tracked_fields: BTreeSet::new(),
            cleanup_methods: default_cleanup_methods(),
            empty_revisions: EmptyRevisionPolicy::default(),
            nested_snapshot: NestedSnapshotPolicy::default(),
        }
    }
}

impl TrackingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_template(mut self, template_id: TemplateId) -> Self {
        self.tracked_templates.insert(template_id);
        self
    }

    pub fn track_fields(mut self, field_ids: impl IntoIterator<Item = FieldId>) -> Self {
        self.tracked_fields.extend(field_ids);
        self
    }

    /// Replace the enabled cleanup methods
    pub fn with_cleanup_methods(mut self, methods: impl IntoIterator<Item = CleanupMethod>) -> Self {
        self.cleanup_methods = methods.into_iter().collect();
        self
    }

    pub fn with_empty_revisions(mut self, policy: EmptyRevisionPolicy) -> Self {
        self.empty_revisions = policy;
        self
    }

    pub fn with_nested_snapshot(mut self, policy: NestedSnapshotPolicy) -> Self {
        self.nested_snapshot = policy;
        self
    }

    /// Parse and validate a YAML configuration
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: TrackingConfig =
            serde_yaml::from_str(content).map_err(|e| VcError::InvalidConfig {
                reason: format!("YAML parse error: {}", e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            VcError::Serialization {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Check structural rules that do not need the host schema
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != 0 {
            return Err(VcError::InvalidConfig {
                reason: format!(
                    "Unsupported schema_version: {}. Expected 0",
                    self.schema_version
                ),
            }
            .into());
        }
        if !self.tracked_fields.is_empty() && self.tracked_templates.is_empty() {
            return Err(VcError::InvalidConfig {
                reason: "tracked_fields is set but no template is tracked".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Report tracked ids the host no longer knows
    ///
    /// Each stale id yields a `ConfigurationError`. The errors are logged at
    /// warn level and returned; they never fail the caller.
    pub fn validate_against<T, F>(&self, template_exists: T, field_exists: F) -> Vec<ExError>
    where
        T: Fn(TemplateId) -> bool,
        F: Fn(FieldId) -> bool,
    {
        let mut warnings = Vec::new();
        for &id in &self.tracked_templates {
            if !template_exists(id) {
                tracing::warn!(template_id = id, "Tracked template no longer exists");
                warnings.push(
                    ExError::new(ExErrorKind::ConfigurationError)
                        .with_op("validate_config")
                        .with_message(format!("Tracked template {} no longer exists", id)),
                );
            }
        }
        for &id in &self.tracked_fields {
            if !field_exists(id) {
                tracing::warn!(field_id = id, "Tracked field no longer exists");
                warnings.push(
                    ExError::new(ExErrorKind::ConfigurationError)
                        .with_op("validate_config")
                        .with_field_id(id)
                        .with_message("Tracked field no longer exists"),
                );
            }
        }
        warnings
    }

    pub fn is_template_tracked(&self, template_id: TemplateId) -> bool {
        self.tracked_templates.contains(&template_id)
    }

    /// Whether a field id is tracked at all; membership in the record's
    /// current fieldgroup is checked by the caller
    pub fn is_field_tracked(&self, field_id: FieldId) -> bool {
        self.tracked_fields.contains(&field_id)
    }

    pub fn cleanup_enabled(&self, method: CleanupMethod) -> bool {
        self.cleanup_methods.contains(&method)
    }
}
