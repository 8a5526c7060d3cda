//! Capability objects handed to instrumentation hooks.
//!
//! Every variant exposes the base [`Shim`] through [`ShimCapabilities`];
//! the specialised ones add helpers for classifying calls in their domain.

pub mod base;
pub mod datastore;
pub mod web;

pub use base::{Shim, ShimCapabilities};
pub use datastore::{parse_statement, DatastoreShim, ParsedStatement};
pub use web::WebFrameworkShim;

use std::future::Future;

use crate::context::Tracer;

/// Chosen when the descriptor is registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShimKind {
    #[default]
    Base,
    Datastore { product: String },
    WebFramework { framework: String },
}

#[derive(Debug, Clone)]
pub enum InstrumentationShim {
    Base(Shim),
    Datastore(DatastoreShim),
    WebFramework(WebFrameworkShim),
}

impl InstrumentationShim {
    /// One shim per hook invocation, scoped to `target_id`.
    pub fn build(kind: &ShimKind, target_id: &str, tracer: Tracer) -> Self {
        let base = Shim::new(target_id, tracer);
        match kind {
            ShimKind::Base => InstrumentationShim::Base(base),
            ShimKind::Datastore { product } => {
                InstrumentationShim::Datastore(DatastoreShim::new(base, product))
            }
            ShimKind::WebFramework { framework } => {
                InstrumentationShim::WebFramework(WebFrameworkShim::new(base, framework))
            }
        }
    }

    pub fn as_datastore(&self) -> Option<&DatastoreShim> {
        match self {
            InstrumentationShim::Datastore(shim) => Some(shim),
            _ => None,
        }
    }

    pub fn as_web_framework(&self) -> Option<&WebFrameworkShim> {
        match self {
            InstrumentationShim::WebFramework(shim) => Some(shim),
            _ => None,
        }
    }

    pub fn create_scoped_execution<A, R, F>(&self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        self.base().create_scoped_execution(f)
    }

    pub fn bind_fn<A, R, F>(&self, f: F) -> impl Fn(A) -> R
    where
        F: Fn(A) -> R,
    {
        self.base().bind_fn(f)
    }

    pub fn bind_once<R, F>(&self, f: F) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        self.base().bind_once(f)
    }

    pub fn bind_future<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        self.base().bind_future(fut)
    }
}

impl ShimCapabilities for InstrumentationShim {
    fn base(&self) -> &Shim {
        match self {
            InstrumentationShim::Base(shim) => shim,
            InstrumentationShim::Datastore(shim) => shim.base(),
            InstrumentationShim::WebFramework(shim) => shim.base(),
        }
    }
}
