use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::loader::RequestId;

/// Tokens of loads that are still in flight. Cancellation is best-effort:
/// the loader decides whether the fetch or the cancel resolves first.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    pending: HashMap<RequestId, CancellationToken>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: RequestId, token: CancellationToken) {
        self.pending.insert(id, token);
    }

    /// Returns false if the request is unknown or already finished.
    pub fn cancel(&mut self, id: &RequestId) -> bool {
        match self.pending.remove(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> Vec<RequestId> {
        self.pending
            .drain()
            .map(|(id, token)| {
                token.cancel();
                id
            })
            .collect()
    }

    pub fn remove(&mut self, id: &RequestId) -> Option<CancellationToken> {
        self.pending.remove(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
