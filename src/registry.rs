use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::InstrumentationError;
use crate::shim::{InstrumentationShim, ShimKind};
use crate::wrap::Export;

/// Hook run once, when the target first loads. `Ok(Some(_))` replaces the
/// export handed back to loaders.
pub type OnLoad =
    Arc<dyn Fn(&InstrumentationShim, &Export, &str) -> anyhow::Result<Option<Export>> + Send + Sync>;
pub type OnError = Arc<dyn Fn(&InstrumentationError) + Send + Sync>;

#[derive(Clone)]
pub struct Descriptor {
    pub target_id: String,
    pub on_load: OnLoad,
    pub on_error: Option<OnError>,
    pub shim_kind: ShimKind,
}

impl Descriptor {
    pub fn new<F>(target_id: impl Into<String>, on_load: F) -> Self
    where
        F: Fn(&InstrumentationShim, &Export, &str) -> anyhow::Result<Option<Export>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            target_id: target_id.into(),
            on_load: Arc::new(on_load),
            on_error: None,
            shim_kind: ShimKind::Base,
        }
    }

    pub fn with_on_error<F>(mut self, on_error: F) -> Self
    where
        F: Fn(&InstrumentationError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    pub fn with_shim_kind(mut self, kind: ShimKind) -> Self {
        self.shim_kind = kind;
        self
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("target_id", &self.target_id)
            .field("has_on_error", &self.on_error.is_some())
            .field("shim_kind", &self.shim_kind)
            .finish()
    }
}

/// Target id -> descriptor. Pure bookkeeping; registering never touches
/// targets that already loaded.
#[derive(Debug, Default)]
pub struct InstrumentationRegistry {
    descriptors: HashMap<String, Descriptor>,
}

impl InstrumentationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or overwrites. Returns the descriptor previously registered
    /// for the same target, if any.
    pub fn register(&mut self, descriptor: Descriptor) -> Option<Descriptor> {
        self.descriptors
            .insert(descriptor.target_id.clone(), descriptor)
    }

    pub fn lookup(&self, target_id: &str) -> Option<&Descriptor> {
        self.descriptors.get(target_id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
