use apploader::loader::{
    load_async, AsyncLoader, BundleLoader, Completion, LoadError, LoadOptions, LoadRequest,
    LoadResult, LoadState, LoadedBundle, RequestId, SchemeRouter,
};
use apploader::services::{FileTransport, StubResponse, StubTransport};
use apploader::LoaderConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const BUNDLE_URL: &str = "https://example.com/app.bundle";

fn stub_loader(transport: StubTransport) -> BundleLoader<StubTransport> {
    BundleLoader::new(transport, &LoaderConfig::default())
}

#[tokio::test]
async fn test_stub_bytes_yield_loaded_bundle() {
    let loader = stub_loader(StubTransport::bytes(b"console.log('app')".to_vec()));
    let options = LoadOptions::new().with("timeoutMs", 5000);

    let request = LoadRequest::new(BUNDLE_URL, Some(options));
    let request_id = request.id;
    let result = load_async(&loader, request).await;

    let bundle = result.expect("Stub bytes should load");
    assert_eq!(bundle.request_id(), request_id);
    assert_eq!(bundle.url().as_str(), BUNDLE_URL);
    assert_eq!(bundle.bytes(), b"console.log('app')");
    assert!(bundle.is_valid());
    assert_eq!(loader.transport().fetch_count(), 1);
}

#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    let loader = stub_loader(StubTransport::error("connection refused"));
    let options = LoadOptions::new().with("timeoutMs", 5000);

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, Some(options))).await;

    assert_eq!(
        result.err(),
        Some(LoadError::TransportFailure("connection refused".to_string()))
    );
}

#[tokio::test]
async fn test_error_status_is_transport_failure() {
    let loader = stub_loader(StubTransport::new(StubResponse::Status(404)));
    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, None)).await;

    match result {
        Err(LoadError::TransportFailure(detail)) => assert!(detail.contains("404"), "{}", detail),
        other => panic!("expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_locators_never_reach_transport() {
    let loader = stub_loader(StubTransport::bytes(b"unused".to_vec()));

    for locator in ["", "   ", "not a url", "://missing-scheme", "ftp://example.com/app.bundle"] {
        let result = load_async(&loader, LoadRequest::new(locator, None)).await;
        assert!(
            matches!(result, Err(LoadError::InvalidLocator(_))),
            "Locator {:?} should be invalid, got {:?}",
            locator,
            result
        );
    }

    assert_eq!(loader.transport().fetch_count(), 0, "No I/O for invalid locators");
}

#[tokio::test]
async fn test_unknown_options_are_ignored() {
    let loader = stub_loader(StubTransport::bytes(b"ok".to_vec()));
    let options = LoadOptions::new()
        .with("someFutureKey", true)
        .with("nested", serde_json::json!({ "a": [1, 2, 3] }))
        .with("timeoutMs", "not-a-number"); // wrong type: treated as absent

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, Some(options))).await;
    assert!(result.is_ok(), "Unknown keys must not reject the request: {:?}", result.err());
}

#[tokio::test]
async fn test_options_from_plain_map() {
    let mut raw = HashMap::new();
    raw.insert("timeoutMs".to_string(), serde_json::json!(250));
    raw.insert("maxBytes".to_string(), serde_json::json!(16));
    raw.insert("headers".to_string(), serde_json::json!({ "x-app": "demo", "x-bad": 1 }));
    let options = LoadOptions::from(raw);

    assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
    assert_eq!(options.max_bytes(), Some(16));
    assert_eq!(options.headers(), vec![("x-app".to_string(), "demo".to_string())]);
}

#[tokio::test]
async fn test_invalid_headers_are_skipped() {
    let loader = stub_loader(StubTransport::bytes(b"ok".to_vec()));
    let headers = serde_json::json!({
        "x-app": "demo",
        "bad header": "value",
        "x-newline": "line\nbreak",
        "x-number": 7,
    });
    let options = LoadOptions::new().with("headers", headers);
    assert_eq!(options.headers(), vec![("x-app".to_string(), "demo".to_string())]);

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, Some(options))).await;
    assert!(result.is_ok(), "A bad header must not fail the load: {:?}", result.err());
    assert_eq!(loader.transport().last_headers(), vec![("x-app".to_string(), "demo".to_string())]);
}

#[tokio::test]
async fn test_timeout_fails_load() {
    let loader = stub_loader(StubTransport::bytes(b"late".to_vec()).with_delay(Duration::from_secs(5)));
    let options = LoadOptions::new().with("timeoutMs", 20);

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, Some(options))).await;
    assert_eq!(result.err(), Some(LoadError::TimedOut(Duration::from_millis(20))));
}

#[tokio::test]
async fn test_default_timeout_from_config() {
    let config = LoaderConfig { default_timeout_ms: 20, ..LoaderConfig::default() };
    let loader = BundleLoader::new(
        StubTransport::bytes(b"late".to_vec()).with_delay(Duration::from_secs(5)),
        &config,
    );

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, None)).await;
    assert_eq!(result.err(), Some(LoadError::TimedOut(Duration::from_millis(20))));
}

#[tokio::test]
async fn test_max_bytes_rejects_large_payload() {
    let loader = stub_loader(StubTransport::bytes(vec![0u8; 64]));
    let options = LoadOptions::new().with("maxBytes", 32);

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, Some(options))).await;
    assert_eq!(result.err(), Some(LoadError::PayloadTooLarge { limit: 32, actual: 64 }));
}

#[tokio::test]
async fn test_cancel_delivers_single_cancelled() {
    let loader = stub_loader(StubTransport::bytes(b"slow".to_vec()).with_delay(Duration::from_secs(5)));
    let request = LoadRequest::new(BUNDLE_URL, None);
    let token = request.cancel_token();
    let request_id = request.id;

    let (tx, mut rx) = mpsc::unbounded_channel();
    loader.load(request, Completion::new(request_id, move |r: LoadResult| {
        let _ = tx.send(r);
    }));

    token.cancel();

    let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Cancel should resolve promptly")
        .expect("One delivery");
    assert_eq!(first.err(), Some(LoadError::Cancelled));

    // Sender dropped with the Completion: no second delivery possible
    assert!(rx.recv().await.is_none(), "Exactly one delivery");
}

#[tokio::test]
async fn test_cancel_before_load_skips_io() {
    let loader = stub_loader(StubTransport::bytes(b"unused".to_vec()));
    let request = LoadRequest::new(BUNDLE_URL, None);
    request.cancel.cancel();

    let result = load_async(&loader, request).await;
    assert_eq!(result.err(), Some(LoadError::Cancelled));
    assert_eq!(loader.transport().fetch_count(), 0);
}

#[tokio::test]
async fn test_transport_panic_becomes_internal_failure() {
    let loader = stub_loader(StubTransport::new(StubResponse::Panic("decoder exploded".to_string())));

    let result = load_async(&loader, LoadRequest::new(BUNDLE_URL, None)).await;
    match result {
        Err(LoadError::Internal(detail)) => assert!(detail.contains("decoder exploded"), "{}", detail),
        other => panic!("expected internal failure, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_have_no_cross_talk() {
    let a = "https://example.com/a.bundle";
    let b = "https://example.com/b.bundle";
    let transport = StubTransport::error("unrouted")
        .route_delayed(a, StubResponse::Bytes(b"bundle-a".to_vec()), Duration::from_millis(30))
        .route(b, StubResponse::Error("connection refused".to_string()));
    let loader = stub_loader(transport);

    let req_a = LoadRequest::new(a, None);
    let req_b = LoadRequest::new(b, None);
    let id_a = req_a.id;

    let (res_a, res_b) = tokio::join!(load_async(&loader, req_a), load_async(&loader, req_b));

    let bundle = res_a.expect("a should load");
    assert_eq!(bundle.request_id(), id_a);
    assert_eq!(bundle.bytes(), b"bundle-a");
    assert_eq!(res_b.err(), Some(LoadError::TransportFailure("connection refused".to_string())));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_once_under_concurrency() {
    const LOADS: usize = 64;
    let transport = StubTransport::bytes(b"ok".to_vec())
        .route("https://example.com/fail/7", StubResponse::Error("boom".to_string()));
    let loader = Arc::new(stub_loader(transport));

    let counters: Vec<Arc<AtomicUsize>> = (0..LOADS).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    let (tx, mut rx) = mpsc::unbounded_channel();

    for (i, counter) in counters.iter().enumerate() {
        let locator = if i == 7 {
            "https://example.com/fail/7".to_string()
        } else if i % 10 == 3 {
            String::new()
        } else {
            format!("https://example.com/ok/{}", i)
        };
        let counter = Arc::clone(counter);
        let tx = tx.clone();
        let request = LoadRequest::new(locator, None);
        let request_id = request.id;
        loader.load(request, Completion::new(request_id, move |r: LoadResult| {
            counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send((i, r.is_ok()));
        }));
    }
    drop(tx);

    let mut delivered = Vec::new();
    while let Some(item) = rx.recv().await {
        delivered.push(item);
    }

    assert_eq!(delivered.len(), LOADS, "One delivery per load");
    for (i, counter) in counters.iter().enumerate() {
        assert_eq!(counter.load(Ordering::SeqCst), 1, "Load {} delivered {} times", i, counter.load(Ordering::SeqCst));
    }
    for (i, ok) in delivered {
        let expected_ok = i != 7 && i % 10 != 3;
        assert_eq!(ok, expected_ok, "Load {} outcome mismatch", i);
    }
}

#[tokio::test]
async fn test_completion_tracks_state() {
    let loader = stub_loader(StubTransport::bytes(b"ok".to_vec()));
    let request = LoadRequest::new(BUNDLE_URL, None);
    let (completion, rx) = Completion::channel(request.id);
    let status = completion.status();
    assert_eq!(status.get(), LoadState::Pending);

    loader.load(request, completion);
    let result = rx.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(status.get(), LoadState::Succeeded);
}

#[test]
fn test_dropped_completion_delivers_cancelled() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&delivered);
    let completion = Completion::new(RequestId::new(), move |r: LoadResult| {
        assert_eq!(r.err(), Some(LoadError::Cancelled));
        seen.fetch_add(1, Ordering::SeqCst);
    });
    let status = completion.status();

    drop(completion);

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(status.get(), LoadState::Failed);
}

#[test]
fn test_status_view_cannot_suppress_delivery() {
    let delivered = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&delivered);
    let completion = Completion::new(RequestId::new(), move |r: LoadResult| {
        assert!(r.is_ok());
        seen.fetch_add(1, Ordering::SeqCst);
    });

    // A cloned status only observes; the completion alone moves it out of Pending.
    let status = completion.status();
    let observer = status.clone();
    assert_eq!(observer.get(), LoadState::Pending);

    let url = reqwest::Url::parse(BUNDLE_URL).unwrap();
    completion.complete(Ok(LoadedBundle::new(status.request_id(), url, b"ok".to_vec())));

    assert_eq!(delivered.load(Ordering::SeqCst), 1, "Exactly one delivery");
    assert_eq!(status.get(), LoadState::Succeeded);
    assert_eq!(observer.get(), LoadState::Succeeded);
}

#[test]
fn test_load_outside_runtime_still_completes() {
    let loader = stub_loader(StubTransport::bytes(b"ok".to_vec()));
    let delivered = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&delivered);
    let request = LoadRequest::new(BUNDLE_URL, None);
    let request_id = request.id;

    loader.load(
        request,
        Completion::new(request_id, move |r: LoadResult| {
            assert!(matches!(r, Err(LoadError::Internal(_))));
            seen.fetch_add(1, Ordering::SeqCst);
        }),
    );

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_router_dispatches_by_scheme() {
    let path = std::env::temp_dir().join(format!("apploader-{}.bundle", RequestId::new()));
    std::fs::write(&path, b"local bundle").unwrap();
    let file_url = format!("file://{}", path.display());

    let config = LoaderConfig::default();
    let remote = Arc::new(BundleLoader::new(StubTransport::bytes(b"remote bundle".to_vec()), &config));
    let local = Arc::new(BundleLoader::new(FileTransport::new(), &config));
    let router = SchemeRouter::new()
        .route("https", remote.clone())
        .route("file", local);

    assert_eq!(router.schemes(), vec!["file", "https"]);

    let remote_result = load_async(&router, LoadRequest::new(BUNDLE_URL, None)).await;
    assert_eq!(remote_result.unwrap().bytes(), b"remote bundle");

    let local_result = load_async(&router, LoadRequest::new(file_url, None)).await;
    assert_eq!(local_result.unwrap().bytes(), b"local bundle");

    let unrouted = load_async(&router, LoadRequest::new("http://example.com/app.bundle", None)).await;
    assert!(matches!(unrouted, Err(LoadError::InvalidLocator(_))));
    assert_eq!(remote.transport().fetch_count(), 1);

    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_router_failures_arrive_after_load_returns() {
    let remote = Arc::new(stub_loader(StubTransport::bytes(b"unused".to_vec())));
    let router = SchemeRouter::new().route("https", remote.clone());
    let delivered = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();

    for locator in ["not a url", "ftp://example.com/app.bundle"] {
        let request = LoadRequest::new(locator, None);
        let request_id = request.id;
        let seen = Arc::clone(&delivered);
        let tx = tx.clone();
        router.load(request, Completion::new(request_id, move |r: LoadResult| {
            seen.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(r);
        }));
        // Single-threaded runtime: nothing runs until this task yields.
        assert_eq!(delivered.load(Ordering::SeqCst), 0, "{:?} delivered inside load()", locator);
    }
    drop(tx);

    let mut results = Vec::new();
    while let Some(result) = rx.recv().await {
        results.push(result);
    }
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| matches!(r, Err(LoadError::InvalidLocator(_)))), "{:?}", results);
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    assert_eq!(remote.transport().fetch_count(), 0, "No I/O for rejected locators");
}

#[tokio::test]
async fn test_missing_local_file_is_transport_failure() {
    let loader = BundleLoader::new(FileTransport::new(), &LoaderConfig::default());
    let missing = std::env::temp_dir().join(format!("apploader-missing-{}.bundle", RequestId::new()));

    let result = load_async(&loader, LoadRequest::new(format!("file://{}", missing.display()), None)).await;
    assert!(matches!(result, Err(LoadError::TransportFailure(_))), "{:?}", result);
}

#[tokio::test]
async fn test_invalidate_is_idempotent() {
    let loader = stub_loader(StubTransport::bytes(b"ok".to_vec()));
    let bundle = load_async(&loader, LoadRequest::new(BUNDLE_URL, None)).await.unwrap();

    bundle.invalidate();
    bundle.invalidate();
    assert!(!bundle.is_valid());
}
