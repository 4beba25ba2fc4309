use std::time::Duration;
use thiserror::Error;
use crate::loader::completion::LoadState;
use crate::loader::request::RequestId;

/// Caller-facing failure of a load. Always delivered through the terminal
/// callback, never raised across the `load()` boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("invalid locator: {0}")]
    InvalidLocator(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("payload of {actual} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { limit: u64, actual: u64 },

    #[error("load cancelled")]
    Cancelled,

    #[error("loader internal error: {0}")]
    Internal(String),
}

/// Failure reported by a `Transport`. Its display text becomes the
/// `TransportFailure` detail.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{0}")]
    Connection(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<TransportError> for LoadError {
    fn from(err: TransportError) -> Self {
        LoadError::TransportFailure(err.to_string())
    }
}

/// Implementer bug: a second terminal transition for the same load.
/// Never handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("request {request_id} already reached terminal state {state:?}")]
pub struct ContractViolation {
    pub request_id: RequestId,
    pub state: LoadState,
}
