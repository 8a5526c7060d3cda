//! Continuation-creating primitives and the interceptor that binds them.
//!
//! [`TokioScheduler`] and [`EventEmitter`] are the raw primitives. Wrapping
//! them in [`BoundScheduler`] / [`BoundEmitter`] makes every callback
//! carry the context that was active when it was handed over.

pub mod bound;
pub mod primitives;

pub use bound::{BoundEmitter, BoundScheduler};
pub use primitives::{
    EventEmitter, EventSource, Listener, ListenerId, Scheduler, Task, TickFn, TimerHandle,
    TokioScheduler,
};
