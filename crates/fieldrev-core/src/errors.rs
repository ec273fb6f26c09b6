use crate::model::{FieldId, FieldKind, RecordId, RevisionId};
use fieldrev_core_types::RequestId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// What went wrong, independent of where
///
/// Hosts match on [`ExErrorKind::code`]. The first four kinds are what the
/// engine surfaces to a host; the others classify lower-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    /// A transaction did not commit; nothing it wrote is visible
    StorageFailure,
    /// Ledger rows that reference missing rows, or unreadable stored keys
    ConsistencyError,
    /// Tracking names a template or field the host does not know
    ConfigurationError,
    NotFound,

    InvalidInput,
    InvalidPointInTime,

    /// Different bytes already sit under the stored filename
    BlobCollision,
    /// A file the ledger points at is not in the blob store
    MissingBlob,

    Io,
    Serialization,

    Internal,
}

impl ExErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::StorageFailure => "ERR_STORAGE_FAILURE",
            ExErrorKind::ConsistencyError => "ERR_CONSISTENCY",
            ExErrorKind::ConfigurationError => "ERR_CONFIGURATION",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidPointInTime => "ERR_INVALID_POINT_IN_TIME",
            ExErrorKind::BlobCollision => "ERR_BLOB_COLLISION",
            ExErrorKind::MissingBlob => "ERR_MISSING_BLOB",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Error returned by every fallible operation in the workspace
///
/// A kind plus whichever of record, field and revision ids the failure site
/// knew about. The engine stamps the request id on the way out.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    record_id: Option<RecordId>,
    field_id: Option<FieldId>,
    revision_id: Option<RevisionId>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            record_id: None,
            field_id: None,
            revision_id: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Name the step that failed (`sqlite`, `blob_put`, ...)
    pub fn with_op(self, op: impl Into<String>) -> Self {
        Self {
            op: Some(op.into()),
            ..self
        }
    }

    pub fn with_record_id(self, id: RecordId) -> Self {
        Self {
            record_id: Some(id),
            ..self
        }
    }

    pub fn with_field_id(self, id: FieldId) -> Self {
        Self {
            field_id: Some(id),
            ..self
        }
    }

    pub fn with_revision_id(self, id: RevisionId) -> Self {
        Self {
            revision_id: Some(id),
            ..self
        }
    }

    pub fn with_request_id(self, request_id: RequestId) -> Self {
        Self {
            request_id: Some(request_id),
            ..self
        }
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self
        }
    }

    /// Wrap the lower-level failure this one was raised from
    pub fn with_source(self, source: ExError) -> Self {
        Self {
            source: Some(Box::new(source)),
            ..self
        }
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn field_id(&self) -> Option<FieldId> {
        self.field_id
    }

    pub fn revision_id(&self) -> Option<RevisionId> {
        self.revision_id
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())?;
        if let Some(op) = &self.op {
            write!(f, " at {}", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        let ids = [
            ("record", self.record_id),
            ("field", self.field_id),
            ("revision", self.revision_id),
        ];
        for (name, id) in ids.iter().filter_map(|(n, id)| id.map(|id| (n, id))) {
            write!(f, " {}={}", name, id)?;
        }
        if let Some(request_id) = self.request_id {
            write!(f, " request={}", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain errors raised by the pure algorithms in this crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VcError {
    /// A stored property key does not follow `data`, `data<lang>` or `<index>.data`
    #[error("Malformed property key: {property}")]
    MalformedProperty { property: String },

    /// A record holds a value whose variant disagrees with the field's declared kind
    #[error("Field {field_id} is declared as {expected:?} but holds a {found} value")]
    KindMismatch {
        field_id: FieldId,
        expected: FieldKind,
        found: &'static str,
    },

    /// A stored value could not be decoded back into its field kind
    #[error("Cannot decode {property} of field {field_id}: {reason}")]
    ValueDecode {
        field_id: FieldId,
        property: String,
        reason: String,
    },

    /// A point-in-time expression could not be parsed
    #[error("Invalid point in time '{input}': {reason}")]
    InvalidPointInTime { input: String, reason: String },

    /// Tracking configuration failed validation
    #[error("Invalid tracking configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Serialization error (JSON/YAML encoding or decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl From<VcError> for ExError {
    fn from(err: VcError) -> Self {
        match err {
            VcError::MalformedProperty { property } => ExError::new(ExErrorKind::ConsistencyError)
                .with_message(format!("Malformed property key: {}", property)),

            VcError::KindMismatch {
                field_id,
                expected,
                found,
            } => ExError::new(ExErrorKind::InvalidInput)
                .with_field_id(field_id)
                .with_message(format!(
                    "Declared as {:?} but holds a {} value",
                    expected, found
                )),

            VcError::ValueDecode {
                field_id,
                property,
                reason,
            } => ExError::new(ExErrorKind::Serialization)
                .with_field_id(field_id)
                .with_message(format!("Cannot decode {}: {}", property, reason)),

            VcError::InvalidPointInTime { input, reason } => {
                ExError::new(ExErrorKind::InvalidPointInTime)
                    .with_message(format!("'{}': {}", input, reason))
            }

            VcError::InvalidConfig { reason } => {
                ExError::new(ExErrorKind::ConfigurationError).with_message(reason)
            }

            VcError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }
        }
    }
}
