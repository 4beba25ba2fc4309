use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::loader::request::parse_locator;
use crate::loader::{
    AsyncLoader, Completion, FetchOptions, LoadError, LoadRequest, LoadResult, LoadedBundle,
    Transport,
};

/// `AsyncLoader` over any `Transport`.
///
/// Recognised options: `timeoutMs`, `headers`, `maxBytes`. Everything else is ignored.
///
/// Completions are delivered from a tokio worker. Cancelling a request always
/// ends it with `Err(LoadError::Cancelled)` unless the fetch already finished;
/// either way the caller hears exactly once.
pub struct BundleLoader<T: Transport> {
    transport: Arc<T>,
    runtime: Option<Handle>,
    default_timeout: Duration,
}

impl<T: Transport> BundleLoader<T> {
    pub fn new(transport: T, config: &LoaderConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            runtime: None,
            default_timeout: config.default_timeout(),
        }
    }

    /// Pin spawned loads to a specific runtime instead of the caller's.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }
}

impl<T: Transport> AsyncLoader for BundleLoader<T> {
    fn load(&self, request: LoadRequest, on_complete: Completion) {
        debug_assert_eq!(on_complete.request_id(), request.id, "completion must belong to the request");

        let Some(runtime) = self.runtime() else {
            warn!("Load {} issued outside of a tokio runtime", request.id);
            on_complete.complete(Err(LoadError::Internal("no async runtime available".to_string())));
            return;
        };

        let transport = Arc::clone(&self.transport);
        let default_timeout = self.default_timeout;

        runtime.spawn(async move {
            let request_id = request.id;
            let result = run_load(transport, request, default_timeout).await;
            match &result {
                Ok(bundle) => info!("Load {} succeeded ({} bytes)", request_id, bundle.len()),
                Err(e) => info!("Load {} failed: {}", request_id, e),
            }
            on_complete.complete(result);
        });
    }
}

async fn run_load<T: Transport>(
    transport: Arc<T>,
    request: LoadRequest,
    default_timeout: Duration,
) -> LoadResult {
    // Validation happens before any transport call.
    let url = parse_locator(&request.locator)?;
    if !transport.supports(&url) {
        return Err(LoadError::InvalidLocator(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if request.cancel.is_cancelled() {
        return Err(LoadError::Cancelled);
    }

    let timeout = request.options.timeout().unwrap_or(default_timeout);
    let fetch_options = FetchOptions {
        headers: request.options.headers(),
        timeout: Some(timeout),
    };

    debug!("Load {} fetching {} (timeout {:?})", request.id, url, timeout);

    let fetch_url = url.clone();
    let mut fetch = tokio::spawn(async move { transport.fetch(&fetch_url, &fetch_options).await });

    // None: cancelled first. Some(Err): timed out.
    let raced = tokio::select! {
        biased;
        _ = request.cancel.cancelled() => None,
        res = tokio::time::timeout(timeout, &mut fetch) => Some(res),
    };

    let joined = match raced {
        Some(Ok(joined)) => joined,
        Some(Err(_)) => {
            fetch.abort();
            return Err(LoadError::TimedOut(timeout));
        }
        None => {
            fetch.abort();
            return Err(LoadError::Cancelled);
        }
    };

    let bytes = joined.map_err(join_error)??;

    if let Some(limit) = request.options.max_bytes() {
        let actual = bytes.len() as u64;
        if actual > limit {
            return Err(LoadError::PayloadTooLarge { limit, actual });
        }
    }

    Ok(LoadedBundle::new(request.id, url, bytes))
}

fn join_error(err: JoinError) -> LoadError {
    if err.is_panic() {
        LoadError::Internal(format!("transport panicked: {}", panic_message(err.into_panic())))
    } else {
        LoadError::Cancelled
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
