//! # Phase Dispatcher
//!
//! A central place to run per-frame callbacks in a hard-coded, declared order.
//!
//! ```text
//! run_phase(Update, dt):
//!
//!   declared order:   [ Clock ]──>[ Audio ]──>[ Input ]──> unordered
//!                         │           │           │            │
//!   buckets:          {c1, c2}      {a1}       {i1, i2}    {x1, y1}
//! ```
//!
//! Registrants of a declared type run in their type's slot of the declared
//! order. Registrants of undeclared types still run, after every declared
//! bucket, in no particular order.
//!
//! ## Mutation During Dispatch
//!
//! Callbacks receive the dispatcher through their [`PhaseContext`] and may
//! register or unregister anything, including themselves. Bucket borrows are
//! released before each callback, and every bucket is walked with the
//! [`DenseSet`] cursor, so every registrant present when its bucket is reached
//! (and not removed before its turn) runs exactly once.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;

use crate::collections::DenseSet;
use crate::error::CoreError;
use crate::frame::{FrameClock, FrameStamp};
use crate::services::ServiceRegistry;
use crate::usage;

use super::context::PhaseContext;
use super::controlled::ControlledHandle;
use super::phase::Phase;
use super::registry::{Bucket, PhaseRegistry};
use super::type_key::TypeKey;

/// Type-ordered dispatcher for per-frame callbacks.
///
/// # Example
///
/// ```rust
/// use orrery_core::{Controlled, ControlledHandle, Phase, PhaseContext, PhaseDispatcher, PhaseSet, TypeKey};
///
/// struct Orbit;
///
/// impl Controlled for Orbit {
///     fn phases(&self) -> PhaseSet {
///         PhaseSet::only(Phase::Update)
///     }
/// }
///
/// let dispatcher = PhaseDispatcher::new("frame", [TypeKey::of::<Orbit>()]);
/// let orbit = ControlledHandle::new(Orbit);
/// assert!(dispatcher.register(&orbit));
/// assert_eq!(dispatcher.run_phase(Phase::Update, 0.016), 1);
/// ```
pub struct PhaseDispatcher {
    /// Owner label used in diagnostics.
    label: String,
    /// Declared type order, duplicates removed (first occurrence kept).
    declared_order: Vec<TypeKey>,
    /// Fast membership test for the declared order.
    declared: HashSet<TypeId>,
    /// One registry per phase, indexed by [`Phase::index`].
    registries: [RefCell<PhaseRegistry<ControlledHandle>>; Phase::COUNT],
    /// Phases currently being run, indexed by [`Phase::index`].
    running: [Cell<bool>; Phase::COUNT],
    /// Undeclared types already reported.
    reported_undeclared: RefCell<HashSet<TypeId>>,
    /// Source of the frame stamp handed to callbacks.
    clock: FrameClock,
}

impl PhaseDispatcher {
    /// Creates a dispatcher with its own frame clock.
    ///
    /// # Arguments
    ///
    /// * `label` - Owner name used in diagnostics
    /// * `declared_order` - Types in dispatch order; duplicates are reported
    ///   and only their first occurrence is kept
    #[must_use]
    pub fn new(label: impl Into<String>, declared_order: impl IntoIterator<Item = TypeKey>) -> Self {
        Self::with_clock(label, declared_order, FrameClock::new())
    }

    /// Creates a dispatcher sharing an existing frame clock.
    #[must_use]
    pub fn with_clock(
        label: impl Into<String>,
        declared_order: impl IntoIterator<Item = TypeKey>,
        clock: FrameClock,
    ) -> Self {
        let label = label.into();
        let mut declared = HashSet::new();
        let mut kept = Vec::new();

        for key in declared_order {
            if declared.insert(key.id()) {
                kept.push(key);
            } else {
                usage::report_config(&CoreError::DuplicateDeclaredType {
                    type_name: key.name(),
                    owner: label.clone(),
                });
            }
        }

        tracing::debug!(owner = %label, declared = kept.len(), "phase dispatcher ready");

        Self {
            label,
            declared_order: kept,
            declared,
            registries: std::array::from_fn(|_| RefCell::new(PhaseRegistry::new())),
            running: std::array::from_fn(|_| Cell::new(false)),
            reported_undeclared: RefCell::new(HashSet::new()),
            clock,
        }
    }

    /// Owner label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The declared order, after duplicate removal.
    #[must_use]
    pub fn declared_order(&self) -> &[TypeKey] {
        &self.declared_order
    }

    /// Returns true if `key` has a slot in the declared order.
    #[must_use]
    pub fn is_declared(&self, key: TypeKey) -> bool {
        self.declared.contains(&key.id())
    }

    /// The frame clock stamping this dispatcher's callbacks.
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Registers a registrant for every phase it implements.
    ///
    /// Declared types go to their ordered bucket, others to the unordered one.
    /// Registering an already-registered handle is a usage error: reported in
    /// debug builds, otherwise ignored.
    ///
    /// # Returns
    ///
    /// `true` if the registrant was added to at least one phase.
    pub fn register(&self, handle: &ControlledHandle) -> bool {
        let bucket = self.bucket_for(handle.type_key());
        let mut added = false;
        let mut duplicate = None;

        for phase in handle.phases().iter() {
            if self.registries[phase.index()]
                .borrow_mut()
                .add(bucket, handle.clone())
            {
                added = true;
            } else {
                duplicate = Some(phase);
            }
        }

        if let Some(phase) = duplicate {
            usage::report(&CoreError::AlreadyRegistered {
                type_name: handle.type_key().name(),
                phase,
                owner: self.label.clone(),
            });
        }

        if added {
            tracing::trace!(owner = %self.label, registrant = %handle, "registered");
        }
        added
    }

    /// Unregisters a registrant from every phase it implements.
    ///
    /// Idempotent, and safe to call from any callback of any phase, including
    /// the registrant's own.
    ///
    /// # Returns
    ///
    /// `true` if the registrant was removed from at least one phase.
    pub fn unregister(&self, handle: &ControlledHandle) -> bool {
        let bucket = self.bucket_for(handle.type_key());
        let mut removed = false;

        for phase in handle.phases().iter() {
            removed |= self.registries[phase.index()]
                .borrow_mut()
                .remove(bucket, handle);
        }

        if removed {
            tracing::trace!(owner = %self.label, registrant = %handle, "unregistered");
        } else {
            usage::report(&CoreError::NotRegistered {
                type_name: handle.type_key().name(),
                owner: self.label.clone(),
            });
        }
        removed
    }

    /// Returns true if the registrant is registered for any phase.
    #[must_use]
    pub fn is_registered(&self, handle: &ControlledHandle) -> bool {
        handle
            .phases()
            .iter()
            .any(|phase| self.is_registered_for(handle, phase))
    }

    /// Returns true if the registrant is registered for `phase`.
    #[must_use]
    pub fn is_registered_for(&self, handle: &ControlledHandle, phase: Phase) -> bool {
        let bucket = self.bucket_for(handle.type_key());
        self.registries[phase.index()]
            .borrow()
            .contains(bucket, handle)
    }

    /// Number of registrants registered for `phase`.
    #[must_use]
    pub fn registered_count(&self, phase: Phase) -> usize {
        self.registries[phase.index()].borrow().len()
    }

    /// Runs one phase: declared buckets in declared order, then the unordered
    /// bucket.
    ///
    /// # Returns
    ///
    /// The number of callbacks invoked.
    pub fn run_phase(&self, phase: Phase, delta_time: f32) -> usize {
        self.run_phase_with(phase, delta_time, None)
    }

    /// Runs one phase, exposing a service registry to the callbacks through
    /// [`PhaseContext::services`].
    pub fn run_phase_with(
        &self,
        phase: Phase,
        delta_time: f32,
        services: Option<&ServiceRegistry>,
    ) -> usize {
        let running = &self.running[phase.index()];
        if running.replace(true) {
            usage::report(&CoreError::NestedPhase {
                phase,
                owner: self.label.clone(),
            });
            return 0;
        }

        let frame = self.clock.now();
        let mut invoked = 0;
        for key in &self.declared_order {
            invoked += self.run_bucket(phase, Bucket::Ordered(key.id()), delta_time, frame, services);
        }
        invoked += self.run_bucket(phase, Bucket::Unordered, delta_time, frame, services);

        running.set(false);
        invoked
    }

    /// Returns true while `phase` is being run.
    #[must_use]
    pub fn is_running(&self, phase: Phase) -> bool {
        self.running[phase.index()].get()
    }

    /// Removes every registrant from every phase.
    pub fn clear(&self) {
        for registry in &self.registries {
            registry.borrow_mut().clear();
        }
    }

    /// Drops empty ordered buckets that are not mid-enumeration.
    pub fn prune(&self) {
        for registry in &self.registries {
            registry.borrow_mut().prune_empty();
        }
    }

    fn bucket_for(&self, key: TypeKey) -> Bucket {
        if self.is_declared(key) {
            Bucket::Ordered(key.id())
        } else {
            Bucket::Unordered
        }
    }

    fn run_bucket(
        &self,
        phase: Phase,
        bucket: Bucket,
        delta_time: f32,
        frame: FrameStamp,
        services: Option<&ServiceRegistry>,
    ) -> usize {
        let registry = &self.registries[phase.index()];
        {
            let mut registry = registry.borrow_mut();
            let Some(set) = registry.bucket_mut(bucket) else {
                return 0;
            };
            if set.is_empty() {
                return 0;
            }
            if let Err(error) = set.begin_enumeration() {
                usage::report(&error);
                return 0;
            }
        }

        let mut invoked = 0;
        loop {
            // The bucket borrow ends with this statement; the callback below
            // is free to register and unregister.
            let next = registry
                .borrow_mut()
                .bucket_mut(bucket)
                .and_then(DenseSet::next_enumerated);
            let Some(handle) = next else {
                break;
            };

            if bucket == Bucket::Unordered {
                self.note_undeclared(handle.type_key());
            }

            let ctx = PhaseContext {
                dispatcher: self,
                current: &handle,
                services,
                phase,
                delta_time,
                frame,
            };
            if handle.invoke(&ctx) {
                invoked += 1;
            }
        }

        if let Some(set) = registry.borrow_mut().bucket_mut(bucket) {
            set.end_enumeration();
        }
        invoked
    }

    fn note_undeclared(&self, key: TypeKey) {
        if cfg!(debug_assertions) && self.reported_undeclared.borrow_mut().insert(key.id()) {
            tracing::warn!(
                owner = %self.label,
                registrant = key.short_name(),
                "not assigned an update order position; updating unordered"
            );
        }
    }
}

impl fmt::Debug for PhaseDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts = f.debug_struct("PhaseDispatcher");
        counts.field("label", &self.label);
        counts.field("declared_order", &self.declared_order);
        for phase in Phase::ALL {
            counts.field(phase.name(), &self.registered_count(phase));
        }
        counts.finish()
    }
}
