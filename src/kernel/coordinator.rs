use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::cancel::CancellationRegistry;
use super::telemetry::event::{OutcomeKind, TelemetryEvent};
use super::telemetry::metrics::TelemetrySnapshot;
use super::telemetry::recorder::TelemetryRecorder;
use super::telemetry::record::{ContextId, TelemetryRecord};
use super::time::duration_micros;

use crate::config::LoaderConfig;
use crate::loader::{AsyncLoader, Completion, LoadError, LoadOptions, LoadRequest, LoadResult, RequestId};

/// A finished load paired with the telemetry captured when it was requested.
#[derive(Debug)]
pub struct LoadReport {
    pub request_id: RequestId,
    pub telemetry: TelemetryRecord,
    pub latency: Duration,
    pub result: LoadResult,
}

impl LoadReport {
    pub fn outcome(&self) -> OutcomeKind {
        OutcomeKind::of(&self.result)
    }
}

struct Inner {
    loader: Arc<dyn AsyncLoader>,
    telemetry: Mutex<TelemetryRecorder>,
    cancels: Mutex<CancellationRegistry>,
    sink: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl Inner {
    fn record(&self, event: TelemetryEvent) {
        if let Some(sink) = &self.sink {
            if sink.send(event.clone()).is_err() {
                debug!("Telemetry sink closed, keeping event locally only");
            }
        }
        lock(&self.telemetry).record(event);
    }
}

/// Binds request-time telemetry to a loader and reports each load upstream.
///
/// Every request gets a fresh `RequestId` shared by its `LoadRequest` and its
/// telemetry events. No retries are attempted.
#[derive(Clone)]
pub struct LoadCoordinator {
    inner: Arc<Inner>,
}

impl LoadCoordinator {
    pub fn new(loader: Arc<dyn AsyncLoader>, config: &LoaderConfig) -> Self {
        Self::build(loader, config, None)
    }

    /// Also forwards every telemetry event to `sink` as it is recorded.
    pub fn with_event_sink(
        loader: Arc<dyn AsyncLoader>,
        config: &LoaderConfig,
        sink: mpsc::UnboundedSender<TelemetryEvent>,
    ) -> Self {
        Self::build(loader, config, Some(sink))
    }

    fn build(
        loader: Arc<dyn AsyncLoader>,
        config: &LoaderConfig,
        sink: Option<mpsc::UnboundedSender<TelemetryEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                telemetry: Mutex::new(TelemetryRecorder::with_capacity(config.max_telemetry_events)),
                cancels: Mutex::new(CancellationRegistry::new()),
                sink,
            }),
        }
    }

    /// Starts a load; `on_report` runs exactly once, on the loader's delivery thread.
    pub fn request<F>(
        &self,
        context_id: ContextId,
        locator: impl Into<String>,
        options: Option<LoadOptions>,
        on_report: F,
    ) -> RequestId
    where
        F: FnOnce(LoadReport) + Send + 'static,
    {
        let (request_id, _) = self.start(context_id, LoadRequest::new(locator, options), on_report);
        request_id
    }

    pub async fn request_async(
        &self,
        context_id: ContextId,
        locator: impl Into<String>,
        options: Option<LoadOptions>,
    ) -> LoadReport {
        let (tx, rx) = oneshot::channel();
        let (request_id, telemetry) =
            self.start(context_id, LoadRequest::new(locator, options), move |report| {
                let _ = tx.send(report);
            });

        match rx.await {
            Ok(report) => report,
            Err(_) => LoadReport {
                request_id,
                telemetry,
                latency: telemetry.elapsed(),
                result: Err(LoadError::Cancelled),
            },
        }
    }

    fn start<F>(&self, context_id: ContextId, request: LoadRequest, on_report: F) -> (RequestId, TelemetryRecord)
    where
        F: FnOnce(LoadReport) + Send + 'static,
    {
        // Stamped before anything else so latency covers the whole attempt.
        let telemetry = TelemetryRecord::new(context_id);
        let request_id = request.id;

        self.inner.record(TelemetryEvent::LoadRequested { request_id, context_id });
        lock(&self.inner.cancels).register(request_id, request.cancel_token());
        debug!("Load {} requested for {}", request_id, context_id);

        let inner = Arc::clone(&self.inner);
        let completion = Completion::new(request_id, move |result: LoadResult| {
            let latency = telemetry.elapsed();
            lock(&inner.cancels).remove(&request_id);

            let outcome = OutcomeKind::of(&result);
            inner.record(TelemetryEvent::LoadCompleted {
                request_id,
                context_id,
                outcome,
                latency_micros: duration_micros(latency),
            });
            info!("Load {} for {} finished as {:?} in {:?}", request_id, context_id, outcome, latency);

            on_report(LoadReport { request_id, telemetry, latency, result });
        });

        // No lock is held here: loaders may complete synchronously.
        self.inner.loader.load(request, completion);
        (request_id, telemetry)
    }

    /// Best-effort. Returns false if the load already finished or is unknown.
    pub fn cancel(&self, request_id: RequestId) -> bool {
        let cancelled = lock(&self.inner.cancels).cancel(&request_id);
        if cancelled {
            self.inner.record(TelemetryEvent::CancelRequested { request_id });
        } else {
            warn!("Cancel for unknown or finished load {}", request_id);
        }
        cancelled
    }

    /// Cancels every in-flight load, e.g. when the owning surface is torn down.
    pub fn cancel_all(&self) -> usize {
        let cancelled = {
            let mut cancels = lock(&self.inner.cancels);
            if cancels.is_empty() {
                debug!("No loads in flight to cancel");
                return 0;
            }
            cancels.cancel_all()
        };
        for request_id in &cancelled {
            self.inner.record(TelemetryEvent::CancelRequested { request_id: *request_id });
        }
        cancelled.len()
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.inner.cancels).len()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        lock(&self.inner.telemetry).snapshot()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        lock(&self.inner.telemetry).events().cloned().collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
