//! Request correlation
//!
//! Every engine operation (save, snapshot, revert, cleanup pass) opens a
//! [`RequestContext`]. Its id tags the operation's tracing span and any error
//! the operation returns, so a failed save can be matched to its log lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

/// Identifier of one engine operation
///
/// UUIDv7, so ids sort by creation time in log storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Per-operation context: correlation id, operation name, start time
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    pub op: &'static str,
    started: Instant,
}

impl RequestContext {
    pub fn new(op: &'static str) -> Self {
        Self::with_request_id(op, RequestId::new())
    }

    /// Continue under an id the host already assigned, e.g. to its own
    /// save request
    pub fn with_request_id(op: &'static str, request_id: RequestId) -> Self {
        Self {
            request_id,
            op,
            started: Instant::now(),
        }
    }

    /// Milliseconds since the context was opened
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}
