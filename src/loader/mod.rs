//! Asynchronous loader capability.
//!
//! # CONTRACT
//! - `load()` returns immediately. The fetch runs on a runtime owned by the implementation.
//! - The `Completion` is delivered **exactly once**, on a thread chosen by the implementation.
//! - Every failure, including a panic inside the loader, arrives as `Err(LoadError)`.
//!   Nothing is raised across the `load()` call itself.
//! - Concurrent loads carry no ordering guarantee relative to each other.

pub mod error;
pub mod request;
pub mod completion;
pub mod handle;
pub mod bundle;
pub mod router;

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

pub use error::{ContractViolation, LoadError, TransportError};
pub use request::{LoadOptions, LoadRequest, RequestId};
pub use completion::{Completion, LoadState, LoadStatus};
pub use handle::LoadedBundle;
pub use bundle::BundleLoader;
pub use router::SchemeRouter;

pub type LoadResult = Result<LoadedBundle, LoadError>;

pub trait AsyncLoader: Send + Sync {
    fn load(&self, request: LoadRequest, on_complete: Completion);
}

/// Future-based form of `AsyncLoader::load`.
pub async fn load_async(loader: &dyn AsyncLoader, request: LoadRequest) -> LoadResult {
    let (completion, rx) = Completion::channel(request.id);
    loader.load(request, completion);
    // The sender lives inside the Completion, which always delivers (even on drop).
    rx.await.unwrap_or(Err(LoadError::Cancelled))
}

/// Per-fetch parameters a `BundleLoader` hands to its transport.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

/// The I/O backend behind a `BundleLoader` (network client, file system, test double).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// URL schemes this transport can fetch, e.g. `["http", "https"]`.
    fn schemes(&self) -> &[&'static str];

    async fn fetch(&self, url: &Url, options: &FetchOptions) -> Result<Vec<u8>, TransportError>;

    fn supports(&self, url: &Url) -> bool {
        self.schemes().iter().any(|s| *s == url.scheme())
    }
}
