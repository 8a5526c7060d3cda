pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod interceptor;
pub mod registry;
pub mod scheduler;
pub mod shim;
pub mod telemetry;
pub mod wrap;

pub use agent::Agent;
pub use config::AgentConfig;
pub use context::{active_context, ExecutionContext, Tracer};
pub use interceptor::{LoadStatus, ModuleInterceptor};
pub use registry::{Descriptor, InstrumentationRegistry};
pub use shim::{InstrumentationShim, ShimCapabilities, ShimKind};
pub use wrap::{Export, Method, Object};
