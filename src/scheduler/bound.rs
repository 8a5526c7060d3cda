use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::primitives::{EventSource, Listener, ListenerId, Scheduler, Task, TickFn, TimerHandle};
use crate::context::{active_context, bind_once, run_in};

/// Scheduler decorator that binds every callback to the context active
/// when it was scheduled. Timing, firing count and cancellation are left
/// to the inner scheduler.
#[derive(Debug, Clone)]
pub struct BoundScheduler<S> {
    inner: S,
}

impl<S: Scheduler> BoundScheduler<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: Scheduler> Scheduler for BoundScheduler<S> {
    fn defer(&self, task: Task) {
        self.inner.defer(Box::new(bind_once(task)));
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerHandle {
        self.inner.set_timeout(delay, Box::new(bind_once(task)))
    }

    fn set_interval(&self, period: Duration, tick: TickFn) -> TimerHandle {
        let captured = active_context();
        self.inner
            .set_interval(period, Arc::new(move || run_in(captured.clone(), || tick())))
    }
}

/// Subscription decorator: each listener fires inside the context that
/// was active when it subscribed, on every emission.
#[derive(Debug, Clone)]
pub struct BoundEmitter<E> {
    inner: E,
}

impl<E: EventSource> BoundEmitter<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: EventSource> EventSource for BoundEmitter<E> {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        let captured = active_context();
        self.inner.on(
            event,
            Arc::new(move |payload: &Value| run_in(captured.clone(), || listener(payload))),
        )
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        self.inner.off(event, id)
    }

    fn emit(&self, event: &str, payload: &Value) -> usize {
        self.inner.emit(event, payload)
    }
}
