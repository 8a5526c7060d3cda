use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::context::Tracer;
use crate::interceptor::{LoadStatus, ModuleInterceptor};
use crate::registry::{Descriptor, InstrumentationRegistry};
use crate::scheduler::{BoundEmitter, BoundScheduler, EventSource, Scheduler};
use crate::telemetry::{SharedRecorder, TelemetryRecorder, TelemetrySnapshot};
use crate::wrap::Export;

/// Owns the registry, the load interceptor, the tracer and the shared
/// telemetry buffer.
pub struct Agent {
    registry: Arc<RwLock<InstrumentationRegistry>>,
    interceptor: ModuleInterceptor,
    tracer: Tracer,
    recorder: SharedRecorder,
}

impl Default for Agent {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        let recorder = TelemetryRecorder::shared();
        let registry = Arc::new(RwLock::new(InstrumentationRegistry::new()));
        let tracer = Tracer::new(recorder.clone(), config.max_segments_per_context);
        if !config.enabled {
            info!("instrumentation disabled, all targets pass through");
        }
        let interceptor =
            ModuleInterceptor::new(registry.clone(), config, tracer.clone(), recorder.clone());

        Self {
            registry,
            interceptor,
            tracer,
            recorder,
        }
    }

    /// Registers instrumentation for a target. Targets already loaded keep
    /// their cached result.
    pub fn register(&self, descriptor: Descriptor) {
        let target_id = descriptor.target_id.clone();
        if let Some(status) = self.interceptor.status(&target_id) {
            warn!(%target_id, ?status, "target already loaded, registration has no effect on it");
        }
        if self.registry.write().register(descriptor).is_some() {
            info!(%target_id, "replaced existing descriptor");
        }
    }

    pub fn load<E, F>(&self, target_id: &str, loader: F) -> Result<Export, E>
    where
        F: FnOnce() -> Result<Export, E>,
    {
        self.interceptor.load(target_id, loader)
    }

    pub fn load_status(&self, target_id: &str) -> Option<LoadStatus> {
        self.interceptor.status(target_id)
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn bind_scheduler<S: Scheduler>(&self, scheduler: S) -> BoundScheduler<S> {
        BoundScheduler::new(scheduler)
    }

    pub fn bind_emitter<E: EventSource>(&self, emitter: E) -> BoundEmitter<E> {
        BoundEmitter::new(emitter)
    }

    pub fn recorder(&self) -> &SharedRecorder {
        &self.recorder
    }

    pub fn telemetry_snapshot(&self) -> TelemetrySnapshot {
        self.recorder.lock().snapshot()
    }
}
