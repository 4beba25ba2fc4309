use serde::{Serialize, Deserialize};
use crate::kernel::telemetry::record::ContextId;
use crate::loader::error::LoadError;
use crate::loader::request::RequestId;

// Allowed: IDs, Durations, Counts, Enums
// Forbidden: Locators, Headers, Payload Bytes

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TelemetryEvent {
    LoadRequested {
        request_id: RequestId,
        context_id: ContextId,
    },

    LoadCompleted {
        request_id: RequestId,
        context_id: ContextId,
        outcome: OutcomeKind,
        latency_micros: u64, // since TelemetryRecord creation
    },

    CancelRequested {
        request_id: RequestId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Succeeded,
    InvalidLocator,
    TransportFailure,
    TimedOut,
    PayloadTooLarge,
    Cancelled,
    Internal,
}

impl OutcomeKind {
    pub fn of<T>(result: &Result<T, LoadError>) -> Self {
        match result {
            Ok(_) => OutcomeKind::Succeeded,
            Err(e) => OutcomeKind::from(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeKind::Succeeded)
    }
}

impl From<&LoadError> for OutcomeKind {
    fn from(err: &LoadError) -> Self {
        match err {
            LoadError::InvalidLocator(_) => OutcomeKind::InvalidLocator,   // Detail STRIPPED
            LoadError::TransportFailure(_) => OutcomeKind::TransportFailure, // Detail STRIPPED
            LoadError::TimedOut(_) => OutcomeKind::TimedOut,
            LoadError::PayloadTooLarge { .. } => OutcomeKind::PayloadTooLarge,
            LoadError::Cancelled => OutcomeKind::Cancelled,
            LoadError::Internal(_) => OutcomeKind::Internal,
        }
    }
}
