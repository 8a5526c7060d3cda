use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    TargetInstrumented {
        target: String,
    },

    /// Hook failed; the target is never retried.
    InstrumentationSkipped {
        target: String,
    },

    /// Loaded without any enabled descriptor matching it.
    TargetPassedThrough {
        target: String,
    },

    HookFailed {
        target: String,
        panicked: bool,
    },

    ContextStarted {
        context_id: Uuid,
    },

    ContextEnded {
        context_id: Uuid,
        duration_ms: u64,
        segments: usize,
    },
}
