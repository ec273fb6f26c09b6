//! Tracing setup and lifecycle logging
//!
//! Hosts call [`init`] once. Engine operations log through
//! [`log_op_start!`](crate::log_op_start), [`log_op_end!`](crate::log_op_end)
//! and [`log_op_error!`](crate::log_op_error); tests read those events back
//! with [`init_test_capture`].

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
