use std::collections::VecDeque;
use super::event::TelemetryEvent;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    pub load_stats: LoadStats,
    pub context_stats: ContextStats,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadStats {
    pub instrumented: u64,
    pub skipped: u64,
    pub passed_through: u64,
    pub hook_failures: u64,
    pub hook_panics: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextStats {
    pub started: u64,
    pub ended: u64,
    pub total_segments: u64,
    pub total_duration_ms: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: u64,
}

pub fn compute_snapshot(events: &VecDeque<TelemetryEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            TelemetryEvent::TargetInstrumented { .. } => snap.load_stats.instrumented += 1,
            TelemetryEvent::InstrumentationSkipped { .. } => snap.load_stats.skipped += 1,
            TelemetryEvent::TargetPassedThrough { .. } => snap.load_stats.passed_through += 1,
            TelemetryEvent::HookFailed { panicked, .. } => {
                snap.load_stats.hook_failures += 1;
                if *panicked {
                    snap.load_stats.hook_panics += 1;
                }
            }
            TelemetryEvent::ContextStarted { .. } => snap.context_stats.started += 1,
            TelemetryEvent::ContextEnded { duration_ms, segments, .. } => {
                let stats = &mut snap.context_stats;
                stats.ended += 1;
                stats.total_segments += *segments as u64;
                stats.total_duration_ms += duration_ms;
                stats.max_duration_ms = stats.max_duration_ms.max(*duration_ms);
            }
        }
    }

    if snap.context_stats.ended > 0 {
        snap.context_stats.avg_duration_ms =
            snap.context_stats.total_duration_ms as f64 / snap.context_stats.ended as f64;
    }

    snap
}
