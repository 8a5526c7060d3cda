use thiserror::Error;

/// Failures raised inside best-effort instrumentation.
/// These never reach the host; they are handed to `on_error` and logged.
#[derive(Debug, Error)]
pub enum InstrumentationError {
    #[error("instrumentation hook for `{target}` failed: {source}")]
    HookFailed {
        target: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("instrumentation hook for `{target}` panicked: {message}")]
    HookPanicked { target: String, message: String },
}

impl InstrumentationError {
    pub fn target(&self) -> &str {
        match self {
            InstrumentationError::HookFailed { target, .. } => target,
            InstrumentationError::HookPanicked { target, .. } => target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("execution context has already ended")]
    Ended,
    #[error("segment limit reached for execution context")]
    SegmentLimit,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no tokio runtime is available on this thread")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid agent configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
