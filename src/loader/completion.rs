use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::loader::error::{ContractViolation, LoadError};
use crate::loader::request::RequestId;
use crate::loader::LoadResult;

/// Lifecycle of one load: `Pending -> {Succeeded, Failed}`. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum LoadState {
    Pending = 0,
    Succeeded = 1,
    Failed = 2,
}

impl LoadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LoadState::Succeeded,
            2 => LoadState::Failed,
            _ => LoadState::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadState::Pending)
    }
}

/// Shared state cell for one load. Read-only outside the crate: only the
/// owning `Completion` moves it out of `Pending`.
#[derive(Debug, Clone)]
pub struct LoadStatus {
    request_id: RequestId,
    state: Arc<AtomicU8>,
}

impl LoadStatus {
    pub(crate) fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: Arc::new(AtomicU8::new(LoadState::Pending as u8)),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn get(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Moves `Pending` into a terminal state. Any second transition is a
    /// `ContractViolation` and leaves the first terminal state in place.
    pub(crate) fn transition(&self, to: LoadState) -> Result<(), ContractViolation> {
        debug_assert!(to.is_terminal(), "transition target must be terminal");
        self.state
            .compare_exchange(
                LoadState::Pending as u8,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| ContractViolation {
                request_id: self.request_id,
                state: LoadState::from_u8(current),
            })
    }
}

pub type OnComplete = Box<dyn FnOnce(LoadResult) + Send + 'static>;

/// The terminal callback of a load.
///
/// `complete` consumes the value, so a loader can deliver at most once.
/// Dropping an undelivered `Completion` delivers `Err(LoadError::Cancelled)`,
/// so a load torn down mid-flight still ends with exactly one notification.
pub struct Completion {
    status: LoadStatus,
    callback: Option<OnComplete>,
}

impl Completion {
    pub fn new<F>(request_id: RequestId, callback: F) -> Self
    where
        F: FnOnce(LoadResult) + Send + 'static,
    {
        Self {
            status: LoadStatus::new(request_id),
            callback: Some(Box::new(callback)),
        }
    }

    /// Future-based form: the receiver resolves with the single result.
    pub fn channel(request_id: RequestId) -> (Self, oneshot::Receiver<LoadResult>) {
        let (tx, rx) = oneshot::channel();
        let completion = Self::new(request_id, move |result| {
            if tx.send(result).is_err() {
                debug!("Completion receiver for {} dropped before delivery", request_id);
            }
        });
        (completion, rx)
    }

    pub fn request_id(&self) -> RequestId {
        self.status.request_id()
    }

    pub fn status(&self) -> LoadStatus {
        self.status.clone()
    }

    pub fn complete(mut self, result: LoadResult) {
        self.deliver(result);
    }

    /// Delivers from a runtime task so the callback never runs before `load()`
    /// returns. Outside a runtime it falls back to delivering inline.
    pub fn complete_detached(self, result: LoadResult) {
        match Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { self.complete(result) });
            }
            Err(_) => self.complete(result),
        }
    }

    fn deliver(&mut self, result: LoadResult) {
        let Some(callback) = self.callback.take() else {
            return;
        };

        let to = if result.is_ok() { LoadState::Succeeded } else { LoadState::Failed };
        match self.status.transition(to) {
            Ok(()) => callback(result),
            Err(violation) => error!("Dropping duplicate completion: {}", violation),
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.callback.is_some() {
            warn!("Load {} abandoned without completion, delivering Cancelled", self.request_id());
            self.deliver(Err(LoadError::Cancelled));
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("request_id", &self.status.request_id())
            .field("state", &self.status.get())
            .finish()
    }
}
