use anyhow::{bail, Context, Result};
use apploader::kernel::telemetry::event::TelemetryEvent;
use apploader::loader::{BundleLoader, SchemeRouter};
use apploader::services::{FileTransport, HttpTransport};
use apploader::{ContextId, LoadCoordinator, LoadOptions, LoaderConfig};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

struct Args {
    context: ContextId,
    timeout_ms: Option<u64>,
    locators: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args { context: ContextId(0), timeout_ms: None, locators: Vec::new() };
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--context" => {
                let raw = iter.next().context("--context needs a value")?;
                args.context = ContextId(raw.parse().with_context(|| format!("bad context id '{}'", raw))?);
            }
            "--timeout-ms" => {
                let raw = iter.next().context("--timeout-ms needs a value")?;
                args.timeout_ms = Some(raw.parse().with_context(|| format!("bad timeout '{}'", raw))?);
            }
            _ => args.locators.push(arg),
        }
    }

    if args.locators.is_empty() {
        bail!("usage: apploader [--context <id>] [--timeout-ms <ms>] <locator>...");
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging/tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    let config = LoaderConfig::from_env();
    tracing::info!("Loader booting (default timeout {:?})", config.default_timeout());

    let http = Arc::new(BundleLoader::new(HttpTransport::new(&config)?, &config));
    let file = Arc::new(BundleLoader::new(FileTransport::new(), &config));
    let router = SchemeRouter::new()
        .route("http", http.clone())
        .route("https", http)
        .route("file", file);

    // Telemetry channel, drained after all loads finish
    let (telemetry_tx, mut telemetry_rx) = mpsc::unbounded_channel::<TelemetryEvent>();
    let coordinator = LoadCoordinator::with_event_sink(Arc::new(router), &config, telemetry_tx);

    let options = args
        .timeout_ms
        .map(|ms| LoadOptions::new().with("timeoutMs", ms));

    let mut tasks = Vec::new();
    for locator in args.locators {
        let coordinator = coordinator.clone();
        let options = options.clone();
        let context = args.context;
        tasks.push(tokio::spawn(async move {
            let report = coordinator.request_async(context, locator.clone(), options).await;
            match &report.result {
                Ok(bundle) => println!("[OK]   {} ({} bytes, {:?})", locator, bundle.len(), report.latency),
                Err(e) => println!("[FAIL] {}: {} ({:?})", locator, e, report.latency),
            }
        }));
    }

    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!("Load task aborted: {}", e);
        }
    }

    let snapshot = coordinator.snapshot();
    drop(coordinator);

    let mut streamed = 0usize;
    while let Ok(event) = telemetry_rx.try_recv() {
        tracing::debug!("telemetry: {:?}", event);
        streamed += 1;
    }

    let summary = json!({
        "events": streamed,
        "snapshot": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
