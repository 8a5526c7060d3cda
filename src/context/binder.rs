//! Active-context slot and the binding primitives built on it.
//!
//! The slot is a task-local. Every install goes through `sync_scope` or
//! `scope`, whose guard puts the previous value back on drop. Restoration
//! therefore happens on normal return, early return and unwinding alike,
//! and nesting is strictly LIFO.

use std::future::Future;

use tracing::debug;

use super::execution::ExecutionContext;
use crate::telemetry::{SharedRecorder, TelemetryEvent};

tokio::task_local! {
    static ACTIVE_CONTEXT: Option<ExecutionContext>;
}

/// Pure read of the slot. `None` when nothing is installed.
pub fn active_context() -> Option<ExecutionContext> {
    ACTIVE_CONTEXT.try_with(|ctx| ctx.clone()).ok().flatten()
}

/// Installs `context` for the duration of `f`, then restores whatever was
/// there before.
pub fn run_in<R>(context: Option<ExecutionContext>, f: impl FnOnce() -> R) -> R {
    ACTIVE_CONTEXT.sync_scope(context, f)
}

/// Captures the context active right now. Every call of the returned
/// function reinstates it around `f`.
pub fn bind_fn<A, R, F>(f: F) -> impl Fn(A) -> R
where
    F: Fn(A) -> R,
{
    let captured = active_context();
    move |arg| run_in(captured.clone(), || f(arg))
}

/// Single-shot variant of [`bind_fn`] for deferred callbacks and timeouts.
pub fn bind_once<R, F>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let captured = active_context();
    move || run_in(captured, f)
}

/// Binds a future to the current context. The context is installed on
/// every poll and removed again before the poll returns.
pub fn bind_future<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    ACTIVE_CONTEXT.scope(active_context(), fut)
}

/// Creates and ends execution contexts, reporting both to telemetry.
#[derive(Clone)]
pub struct Tracer {
    recorder: SharedRecorder,
    max_segments: usize,
}

impl Tracer {
    pub fn new(recorder: SharedRecorder, max_segments: usize) -> Self {
        Self {
            recorder,
            max_segments,
        }
    }

    pub fn create_context(&self) -> ExecutionContext {
        let ctx = ExecutionContext::new(self.max_segments);
        debug!(context_id = %ctx.id(), "execution context started");
        self.recorder
            .lock()
            .record(TelemetryEvent::ContextStarted { context_id: ctx.id() });
        ctx
    }

    /// Each call of the returned function runs `f` inside a brand new
    /// context. The context is not ended here; whoever captured it ends it.
    pub fn create_scoped_execution<A, R, F>(&self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        let tracer = self.clone();
        move |arg| {
            let ctx = tracer.create_context();
            run_in(Some(ctx), || f(arg))
        }
    }

    /// One-shot form of [`Tracer::create_scoped_execution`].
    pub fn in_new_context<R>(&self, f: impl FnOnce() -> R) -> R {
        run_in(Some(self.create_context()), f)
    }

    /// Marks `ctx` ended. Returns false if it already was. The slot is
    /// left alone even when `ctx` currently occupies it.
    pub fn end(&self, ctx: &ExecutionContext) -> bool {
        if !ctx.finish() {
            debug!(context_id = %ctx.id(), "ignoring end of already ended context");
            return false;
        }
        let duration = ctx.duration();
        let segments = ctx.segments().len();
        debug!(context_id = %ctx.id(), ?duration, segments, "execution context ended");
        self.recorder.lock().record(TelemetryEvent::ContextEnded {
            context_id: ctx.id(),
            duration_ms: duration.as_millis() as u64,
            segments,
        });
        true
    }
}
