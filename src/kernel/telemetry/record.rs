use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use crate::kernel::time::Timestamp;

/// Owning surface/session of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextId(pub i32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Timing fact for a single fetch: when the fetch was decided upon, and for whom.
///
/// `request_start_time` is stamped by the constructor, never supplied by the
/// caller, so every call site measures from the same moment. The record has no
/// mutators; later lifecycle facts are separate `TelemetryEvent`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryRecord {
    request_start_time: Timestamp,
    context_id: ContextId,
}

impl TelemetryRecord {
    pub fn new(context_id: ContextId) -> Self {
        Self {
            request_start_time: Timestamp::now(),
            context_id,
        }
    }

    pub fn request_start_time(&self) -> Timestamp {
        self.request_start_time
    }

    pub fn context_id(&self) -> ContextId {
        self.context_id
    }

    pub fn elapsed(&self) -> Duration {
        self.request_start_time.elapsed()
    }
}
