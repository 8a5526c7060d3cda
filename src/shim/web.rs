use super::base::{Shim, ShimCapabilities};
use crate::context;
use crate::wrap::{Method, Object};

#[derive(Debug, Clone)]
pub struct WebFrameworkShim {
    base: Shim,
    framework: String,
}

impl WebFrameworkShim {
    pub fn new(base: Shim, framework: impl Into<String>) -> Self {
        Self {
            base,
            framework: framework.into(),
        }
    }

    pub fn framework(&self) -> &str {
        &self.framework
    }

    /// Records each call of `owner.name` as `Middleware/{framework}/{middleware}`.
    pub fn record_middleware(&self, owner: &Object, name: &str, middleware: &str) -> Option<Method> {
        let segment_name = format!("Middleware/{}/{}", self.framework, middleware);
        self.record(owner, name, &segment_name)
    }

    /// Names the active context. Returns false with no active context or
    /// when it has already ended.
    pub fn set_transaction_name(&self, name: &str) -> bool {
        match context::active_context() {
            Some(ctx) => ctx
                .set_name(format!(
                    "WebTransaction/{}/{}",
                    self.framework,
                    name.trim_start_matches('/')
                ))
                .is_ok(),
            None => false,
        }
    }
}

impl ShimCapabilities for WebFrameworkShim {
    fn base(&self) -> &Shim {
        &self.base
    }
}
