use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, trace, warn};

use crate::config::AgentConfig;
use crate::context::Tracer;
use crate::error::InstrumentationError;
use crate::registry::{Descriptor, InstrumentationRegistry};
use crate::shim::InstrumentationShim;
use crate::telemetry::{SharedRecorder, TelemetryEvent};
use crate::wrap::{Export, Object};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Instrumented,
    /// The hook failed. Permanent for the life of the process.
    Skipped,
    PassedThrough,
}

#[derive(Debug, Clone)]
struct LoadOutcome {
    status: LoadStatus,
    export: Export,
}

#[derive(Debug)]
enum TargetState {
    /// A load is running on this thread.
    Loading(ThreadId),
    Done(LoadOutcome),
}

/// Sits on the host's load seam. Each target is examined once; whatever
/// that first load produced is cached and handed to every later caller.
pub struct ModuleInterceptor {
    registry: Arc<RwLock<InstrumentationRegistry>>,
    config: AgentConfig,
    tracer: Tracer,
    recorder: SharedRecorder,
    targets: Mutex<HashMap<String, TargetState>>,
    settled: Condvar,
}

/// Clears an unfinished `Loading` mark however the load exits and wakes
/// any thread waiting on the target.
struct LoadingGuard<'a> {
    interceptor: &'a ModuleInterceptor,
    target_id: &'a str,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut targets = self.interceptor.targets.lock();
        if matches!(targets.get(self.target_id), Some(TargetState::Loading(_))) {
            targets.remove(self.target_id);
        }
        drop(targets);
        self.interceptor.settled.notify_all();
    }
}

impl ModuleInterceptor {
    pub fn new(
        registry: Arc<RwLock<InstrumentationRegistry>>,
        config: AgentConfig,
        tracer: Tracer,
        recorder: SharedRecorder,
    ) -> Self {
        Self {
            registry,
            config,
            tracer,
            recorder,
            targets: Mutex::new(HashMap::new()),
            settled: Condvar::new(),
        }
    }

    /// Loads `target_id` through `loader`, applying its descriptor the
    /// first time. Only errors from `loader` itself reach the caller;
    /// failed loads are not cached.
    ///
    /// A load of a target that this thread is already loading (a hook
    /// requesting its own target) calls `loader` directly and skips
    /// instrumentation. Other threads block until the first load settles
    /// and then share its outcome.
    pub fn load<E, F>(&self, target_id: &str, loader: F) -> Result<Export, E>
    where
        F: FnOnce() -> Result<Export, E>,
    {
        let me = thread::current().id();
        let mut targets = self.targets.lock();
        loop {
            match targets.get(target_id) {
                Some(TargetState::Done(outcome)) => return Ok(outcome.export.clone()),
                Some(TargetState::Loading(owner)) if *owner == me => {
                    drop(targets);
                    debug!(target_id, "re-entrant load, bypassing instrumentation");
                    return loader();
                }
                Some(TargetState::Loading(_)) => {
                    trace!(target_id, "waiting for load on another thread");
                    self.settled.wait(&mut targets);
                }
                None => {
                    targets.insert(target_id.to_string(), TargetState::Loading(me));
                    break;
                }
            }
        }
        drop(targets);

        let _guard = LoadingGuard {
            interceptor: self,
            target_id,
        };

        let loaded = loader()?;
        let outcome = self.apply(target_id, loaded);
        let export = outcome.export.clone();
        self.targets
            .lock()
            .insert(target_id.to_string(), TargetState::Done(outcome));
        Ok(export)
    }

    pub fn status(&self, target_id: &str) -> Option<LoadStatus> {
        match self.targets.lock().get(target_id) {
            Some(TargetState::Done(outcome)) => Some(outcome.status),
            _ => None,
        }
    }

    fn apply(&self, target_id: &str, loaded: Export) -> LoadOutcome {
        let descriptor = if self.config.is_target_enabled(target_id) {
            self.registry.read().lookup(target_id).cloned()
        } else {
            None
        };

        let Some(descriptor) = descriptor else {
            debug!(target_id, "no instrumentation for target");
            self.record(TelemetryEvent::TargetPassedThrough {
                target: target_id.to_string(),
            });
            return LoadOutcome {
                status: LoadStatus::PassedThrough,
                export: loaded,
            };
        };

        let shim = InstrumentationShim::build(&descriptor.shim_kind, target_id, self.tracer.clone());
        // Objects are patched in place; keep their slots for rollback.
        let before = loaded.as_object().map(Object::snapshot);

        match run_hook(&descriptor, &shim, &loaded, target_id) {
            Ok(replacement) => {
                info!(target_id, replaced = replacement.is_some(), "instrumented target");
                self.record(TelemetryEvent::TargetInstrumented {
                    target: target_id.to_string(),
                });
                LoadOutcome {
                    status: LoadStatus::Instrumented,
                    export: replacement.unwrap_or(loaded),
                }
            }
            Err(err) => {
                warn!(target_id, error = %err, "instrumentation failed, target left uninstrumented");
                self.record(TelemetryEvent::HookFailed {
                    target: target_id.to_string(),
                    panicked: matches!(err, InstrumentationError::HookPanicked { .. }),
                });
                self.record(TelemetryEvent::InstrumentationSkipped {
                    target: target_id.to_string(),
                });
                if let (Some(object), Some(before)) = (loaded.as_object(), before) {
                    object.restore(before);
                    debug!(target_id, "rolled back partial instrumentation");
                }
                notify_error(&descriptor, &err);
                LoadOutcome {
                    status: LoadStatus::Skipped,
                    export: loaded,
                }
            }
        }
    }

    fn record(&self, event: TelemetryEvent) {
        self.recorder.lock().record(event);
    }
}

/// The boundary around third-party hook code: errors and panics both come
/// back as values.
fn run_hook(
    descriptor: &Descriptor,
    shim: &InstrumentationShim,
    loaded: &Export,
    target_id: &str,
) -> Result<Option<Export>, InstrumentationError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        (descriptor.on_load)(shim, loaded, target_id)
    }));

    match result {
        Ok(Ok(replacement)) => Ok(replacement),
        Ok(Err(source)) => Err(InstrumentationError::HookFailed {
            target: target_id.to_string(),
            source,
        }),
        Err(payload) => Err(InstrumentationError::HookPanicked {
            target: target_id.to_string(),
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn notify_error(descriptor: &Descriptor, err: &InstrumentationError) {
    let Some(on_error) = &descriptor.on_error else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| on_error(err))).is_err() {
        warn!(target_id = err.target(), "on_error handler panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
