use std::future::Future;

use serde_json::Value;
use tracing::trace;

use crate::context::{self, ExecutionContext, Tracer};
use crate::wrap::{self, Export, Getter, Method, Object, Setter};

/// Base capability set. Holds nothing but the target it was built for and
/// a handle for creating contexts.
#[derive(Clone)]
pub struct Shim {
    target_id: String,
    tracer: Tracer,
}

impl std::fmt::Debug for Shim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shim").field("target_id", &self.target_id).finish()
    }
}

impl Shim {
    pub fn new(target_id: impl Into<String>, tracer: Tracer) -> Self {
        Self {
            target_id: target_id.into(),
            tracer,
        }
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn create_scoped_execution<A, R, F>(&self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        self.tracer.create_scoped_execution(f)
    }

    pub fn bind_fn<A, R, F>(&self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        context::bind_fn(f)
    }

    pub fn bind_once<R, F>(&self, f: F) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        context::bind_once(f)
    }

    pub fn bind_future<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        context::bind_future(fut)
    }
}

/// The contract every shim variant honours. Hooks can always treat a shim
/// through this trait, whatever variant they were handed.
///
/// The binding helpers return `impl Fn`/`impl Future` and so live as
/// inherent methods on [`Shim`] and [`InstrumentationShim`](super::InstrumentationShim).
pub trait ShimCapabilities {
    fn base(&self) -> &Shim;

    fn target_id(&self) -> &str {
        &self.base().target_id
    }

    fn wrap_method<F>(&self, owner: &Object, name: &str, make_wrapper: F) -> Option<Method>
    where
        F: FnOnce(Method) -> Method,
    {
        wrap::wrap_method(owner, self.target_id(), name, make_wrapper)
    }

    fn unwrap_method(&self, owner: &Object, name: &str) -> bool {
        wrap::unwrap_method(owner, self.target_id(), name)
    }

    fn wrap_export<F>(&self, original: Export, make_replacement: F) -> Export
    where
        F: FnOnce(Export) -> Export,
    {
        wrap::wrap_export(original, make_replacement)
    }

    fn wrap_deprecated(
        &self,
        owner: Option<&Object>,
        name: Option<&str>,
        get: Option<Getter>,
        set: Option<Setter>,
    ) -> bool {
        wrap::wrap_deprecated(owner, Some(self.target_id()), name, get, set)
    }

    fn active_context(&self) -> Option<ExecutionContext> {
        context::active_context()
    }

    fn end(&self, ctx: &ExecutionContext) -> bool {
        self.base().tracer.end(ctx)
    }

    /// Wraps `owner.name` so each call records a segment named
    /// `segment_name` on whichever context is active at call time.
    fn record(&self, owner: &Object, name: &str, segment_name: &str) -> Option<Method> {
        let segment_name = segment_name.to_string();
        self.record_with(owner, name, move |_| segment_name.clone())
    }

    /// Like [`ShimCapabilities::record`] with the segment name derived from
    /// the call arguments.
    fn record_with<N>(&self, owner: &Object, name: &str, namer: N) -> Option<Method>
    where
        N: Fn(&[Value]) -> String + Send + Sync + 'static,
    {
        self.wrap_method(owner, name, move |original| {
            Method::new(move |args| record_call(&namer(args), &original, args))
        })
    }
}

impl ShimCapabilities for Shim {
    fn base(&self) -> &Shim {
        self
    }
}

/// Runs `original`, timing it as a segment when a context is active.
/// Segment failures never affect the call itself.
pub(crate) fn record_call(segment_name: &str, original: &Method, args: &[Value]) -> anyhow::Result<Value> {
    let segment = context::active_context().and_then(|ctx| match ctx.start_segment(segment_name) {
        Ok(handle) => Some(handle),
        Err(err) => {
            trace!(segment_name, %err, "segment not recorded");
            None
        }
    });

    let result = original.call(args);

    if let Some(handle) = segment {
        // Ended contexts reject late segment ends; the call result stands.
        let _ = handle.end();
    }
    result
}
