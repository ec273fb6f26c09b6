//! Log schema
//!
//! Operation names, event names and structured field keys used by the store
//! and engine. Log consumers filter on these, so they are part of the
//! crate's public surface.

// Lifecycle events emitted by `log_op_start!` / `log_op_end!` / `log_op_error!`
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Operation names
pub const OP_SAVE: &str = "save";
pub const OP_SNAPSHOT: &str = "snapshot";
pub const OP_REVERT: &str = "revert";
pub const OP_CLEANUP_DELETED_RECORD: &str = "cleanup_deleted_record";
pub const OP_CLEANUP_DELETED_FIELD: &str = "cleanup_deleted_field";
pub const OP_CLEANUP_REMOVED_FIELD: &str = "cleanup_removed_field";
pub const OP_CLEANUP_CHANGED_TEMPLATE: &str = "cleanup_changed_template";

// Keys every lifecycle event carries
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

/// Span field holding the [`crate::RequestId`]
pub const FIELD_REQUEST_ID: &str = "request_id";

// Error events
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

/// Every cleanup operation name, in the order the coordinator documents them
pub const CLEANUP_OPS: [&str; 4] = [
    OP_CLEANUP_DELETED_RECORD,
    OP_CLEANUP_DELETED_FIELD,
    OP_CLEANUP_REMOVED_FIELD,
    OP_CLEANUP_CHANGED_TEMPLATE,
];
