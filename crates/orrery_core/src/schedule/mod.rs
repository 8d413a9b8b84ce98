//! # Phase Scheduling
//!
//! Type-ordered per-frame dispatch:
//!
//! - [`Phase`] / [`PhaseSet`]: the four frame phases and subsets of them
//! - [`TypeKey`]: concrete-type identity used for declared orders
//! - [`Controlled`] / [`ControlledHandle`]: the callback capability and its shared handle
//! - [`PhaseRegistry`]: per-phase buckets
//! - [`PhaseDispatcher`]: runs a phase in declared type order

mod context;
mod controlled;
mod dispatcher;
mod phase;
mod registry;
mod type_key;

pub use context::PhaseContext;
pub use controlled::{Controlled, ControlledHandle};
pub use dispatcher::PhaseDispatcher;
pub use phase::{Phase, PhaseSet};
pub use registry::{Bucket, PhaseRegistry};
pub use type_key::TypeKey;
