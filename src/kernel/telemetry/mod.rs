//! Load Telemetry
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** influence how a load is performed or completed.
//! It exists solely for observability and latency reporting.
//!
//! # PRIVACY INVARIANT
//! Telemetry events must **NEVER** contain locators, headers or payload bytes.
//! Only internal IDs (RequestId, ContextId) and metrics (Durations, Counts) are allowed.

pub mod record;
pub mod event;
pub mod metrics;
pub mod recorder;

pub use record::{ContextId, TelemetryRecord};
