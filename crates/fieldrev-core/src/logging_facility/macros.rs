//! Lifecycle macros
//!
//! An operation logs one `start` and then exactly one of `end` or
//! `end_error`. All three carry `component`, `op` and `event` so a log query
//! can rebuild the lifecycle of one request.

/// `start` event at info level
///
/// ```
/// # use fieldrev_core::log_op_start;
/// log_op_start!("save");
/// log_op_start!("save", record_id = 1001, tracked_fields = 4);
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_START,
            $($($field)+)?
        )
    };
}

/// `end` event at info level; `duration_ms` is required
///
/// ```
/// # use fieldrev_core::log_op_end;
/// log_op_end!("snapshot", duration_ms = 3);
/// log_op_end!("snapshot", duration_ms = 3, revision_id = 7);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($($field)+)?
        )
    };
}

/// `end_error` event at error level
///
/// The error is anything that converts into `ExError`; its kind and stable
/// code become `err.kind` and `err.code`.
///
/// ```
/// # use fieldrev_core::log_op_error;
/// # use fieldrev_core::errors::{ExError, ExErrorKind};
/// log_op_error!("save", ExError::new(ExErrorKind::MissingBlob), duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr $(, $($field:tt)+)?) => {{
        let logged: $crate::errors::ExError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = $crate::core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err.kind = ?logged.kind(),
            err.code = logged.code(),
            $($($field)+)?
        )
    }};
}
