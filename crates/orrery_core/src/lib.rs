//! # ORRERY Core Runtime
//!
//! Deterministic, type-ordered per-frame scheduling for a game runtime:
//! - `DenseSet`: O(1) unique-membership collection, safe to mutate mid-enumeration
//! - `PhaseDispatcher`: runs Update/LateUpdate/FixedUpdate/DebugUpdate callbacks
//!   in a declared type order
//! - `ServiceRegistry`: declared-order singleton services, eager or on demand
//! - `EventBus`: kind-keyed publish/subscribe
//!
//! ## Architecture Rules
//!
//! 1. **Single-threaded** - no locks; shared state uses `Rc`/`RefCell`/`Cell`
//! 2. **Mutation during dispatch is safe** - callbacks may register and
//!    unregister anything, including themselves
//! 3. **No panics across the boundary** - usage errors are reported in debug
//!    builds and degrade to no-ops
//!
//! ## Example
//!
//! ```rust
//! use orrery_core::{Controlled, ControlledHandle, Phase, PhaseContext, PhaseDispatcher, PhaseSet, TypeKey};
//!
//! struct Satellite { ttl: u32 }
//!
//! impl Controlled for Satellite {
//!     fn phases(&self) -> PhaseSet {
//!         PhaseSet::only(Phase::Update)
//!     }
//!
//!     fn update(&mut self, ctx: &PhaseContext<'_>) {
//!         self.ttl -= 1;
//!         if self.ttl == 0 {
//!             ctx.unregister_self();
//!         }
//!     }
//! }
//!
//! let dispatcher = PhaseDispatcher::new("frame", [TypeKey::of::<Satellite>()]);
//! dispatcher.register(&ControlledHandle::new(Satellite { ttl: 1 }));
//! assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 1);
//! assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod collections;
pub mod error;
pub mod events;
pub mod frame;
pub mod schedule;
pub mod services;
pub mod usage;

pub use collections::DenseSet;
pub use error::{CoreError, CoreResult};
pub use events::{EventBus, EventContext, SubscriptionId};
pub use frame::{FrameClock, FrameStamp};
pub use schedule::{
    Bucket, Controlled, ControlledHandle, Phase, PhaseContext, PhaseDispatcher, PhaseRegistry,
    PhaseSet, TypeKey,
};
pub use services::{
    ConstructionPolicy, PollMode, Service, ServiceDescriptor, ServiceRegistry, ServiceState,
};
