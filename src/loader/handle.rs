use std::sync::atomic::{AtomicBool, Ordering};
use reqwest::Url;
use tracing::debug;

use crate::kernel::time::Timestamp;
use crate::loader::request::RequestId;

/// A loaded bundle handed to the caller on success. The caller owns it.
#[derive(Debug)]
pub struct LoadedBundle {
    request_id: RequestId,
    url: Url,
    bytes: Vec<u8>,
    loaded_at: Timestamp,
    valid: AtomicBool,
}

impl LoadedBundle {
    pub fn new(request_id: RequestId, url: Url, bytes: Vec<u8>) -> Self {
        Self {
            request_id,
            url,
            bytes,
            loaded_at: Timestamp::now(),
            valid: AtomicBool::new(true),
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }

    /// Marks the app record as torn down. Idempotent.
    pub fn invalidate(&self) {
        if self.valid.swap(false, Ordering::AcqRel) {
            debug!("Bundle {} from {} invalidated", self.request_id, self.url);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }
}
