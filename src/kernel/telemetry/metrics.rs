use std::collections::{BTreeMap, VecDeque};
use serde::Serialize;
use super::event::{TelemetryEvent, OutcomeKind};
use super::record::ContextId;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetrySnapshot {
    pub load_stats: LoadStats,
    pub per_context: BTreeMap<ContextId, ContextStats>,
    pub cancel_requests: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadStats {
    pub requested: u64,
    pub completed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub total_latency_micros: u64,
    pub avg_latency_micros: f64,
    pub max_latency_micros: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContextStats {
    pub requested: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total_latency_micros: u64,
    pub avg_latency_micros: f64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::LoadRequested { context_id, .. } => {
                snap.load_stats.requested += 1;
                snap.per_context.entry(*context_id).or_default().requested += 1;
            }
            TelemetryEvent::LoadCompleted { context_id, outcome, latency_micros, .. } => {
                let stats = &mut snap.load_stats;
                stats.completed += 1;
                stats.total_latency_micros = stats.total_latency_micros.saturating_add(*latency_micros);
                stats.max_latency_micros = stats.max_latency_micros.max(*latency_micros);

                match outcome {
                    OutcomeKind::Succeeded => stats.succeeded += 1,
                    OutcomeKind::Cancelled => {
                        stats.failed += 1;
                        stats.cancelled += 1;
                    }
                    OutcomeKind::TimedOut => {
                        stats.failed += 1;
                        stats.timed_out += 1;
                    }
                    _ => stats.failed += 1,
                }

                let ctx = snap.per_context.entry(*context_id).or_default();
                ctx.total_latency_micros = ctx.total_latency_micros.saturating_add(*latency_micros);
                if outcome.is_success() {
                    ctx.succeeded += 1;
                } else {
                    ctx.failed += 1;
                }
            }
            TelemetryEvent::CancelRequested { .. } => snap.cancel_requests += 1,
        }
    }

    // Compute Averages
    if snap.load_stats.completed > 0 {
        snap.load_stats.avg_latency_micros =
            snap.load_stats.total_latency_micros as f64 / snap.load_stats.completed as f64;
    }

    for ctx in snap.per_context.values_mut() {
        let completed = ctx.succeeded + ctx.failed;
        if completed > 0 {
            ctx.avg_latency_micros = ctx.total_latency_micros as f64 / completed as f64;
        }
    }

    snap
}
