use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::loader::{FetchOptions, Transport, TransportError};

/// Scripted reply of a `StubTransport`.
#[derive(Debug, Clone)]
pub enum StubResponse {
    Bytes(Vec<u8>),
    Error(String),
    Status(u16),
    Panic(String),
}

#[derive(Debug, Clone)]
struct StubRoute {
    response: StubResponse,
    delay: Option<Duration>,
}

/// Deterministic test double for `http`/`https` fetches.
///
/// Unrouted URLs get the fallback response. Every call to `fetch` is counted,
/// so callers can assert that no I/O was attempted. The headers of the most
/// recent fetch are kept for inspection.
#[derive(Debug)]
pub struct StubTransport {
    routes: HashMap<String, StubRoute>,
    fallback: StubRoute,
    fetches: AtomicUsize,
    last_headers: Mutex<Vec<(String, String)>>,
}

impl StubTransport {
    pub fn new(fallback: StubResponse) -> Self {
        Self {
            routes: HashMap::new(),
            fallback: StubRoute { response: fallback, delay: None },
            fetches: AtomicUsize::new(0),
            last_headers: Mutex::new(Vec::new()),
        }
    }

    pub fn bytes(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StubResponse::Bytes(body.into()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StubResponse::Error(message.into()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.fallback.delay = Some(delay);
        self
    }

    pub fn route(self, url: impl Into<String>, response: StubResponse) -> Self {
        self.route_inner(url.into(), response, None)
    }

    pub fn route_delayed(self, url: impl Into<String>, response: StubResponse, delay: Duration) -> Self {
        self.route_inner(url.into(), response, Some(delay))
    }

    fn route_inner(mut self, url: String, response: StubResponse, delay: Option<Duration>) -> Self {
        self.routes.insert(url, StubRoute { response, delay });
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.last_headers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn schemes(&self) -> &[&'static str] {
        &["http", "https"]
    }

    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<Vec<u8>, TransportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock().unwrap_or_else(PoisonError::into_inner) = options.headers.clone();

        let route = self.routes.get(url.as_str()).unwrap_or(&self.fallback).clone();
        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        match route.response {
            StubResponse::Bytes(body) => Ok(body),
            StubResponse::Error(message) => Err(TransportError::Connection(message)),
            StubResponse::Status(code) => Err(TransportError::Status(code)),
            StubResponse::Panic(message) => panic!("{}", message),
        }
    }
}
