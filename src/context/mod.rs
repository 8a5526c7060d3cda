pub mod binder;
pub mod execution;

pub use binder::{active_context, bind_fn, bind_future, bind_once, run_in, Tracer};
pub use execution::{ContextState, ExecutionContext, Segment, SegmentHandle};
