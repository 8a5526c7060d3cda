//! Supportability telemetry for the instrumentation core.
//!
//! Events stay in memory. Nothing here serializes to a wire format or
//! leaves the process; exporters live outside this crate.
//!
//! Events carry identifiers and durations only, never argument values
//! or return values of instrumented calls.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::TelemetryEvent;
pub use metrics::TelemetrySnapshot;
pub use recorder::{SharedRecorder, TelemetryRecorder};
