//! # Services
//!
//! Declared-order singleton services with lazy or eager construction, an
//! optional throttled self-update, and phase callbacks driven by the
//! registry's own dispatcher.

mod descriptor;
mod registry;
mod service;

pub use descriptor::ServiceDescriptor;
pub use registry::{ServiceRegistry, ServiceState};
pub use service::{ConstructionPolicy, PollMode, Service};
