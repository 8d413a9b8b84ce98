//! # Controlled Registrants
//!
//! The callback capability a registrant exposes to a [`PhaseDispatcher`], and
//! the shared handle the dispatcher stores in its buckets.
//!
//! [`PhaseDispatcher`]: crate::schedule::PhaseDispatcher

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::CoreError;
use crate::usage;

use super::context::PhaseContext;
use super::phase::{Phase, PhaseSet};
use super::type_key::TypeKey;

/// An object that receives per-frame callbacks from a dispatcher.
///
/// Implement the callbacks for the phases returned by [`Controlled::phases`];
/// the others are never called.
///
/// # Example
///
/// ```rust
/// use orrery_core::{Controlled, PhaseContext, PhaseSet, Phase};
///
/// struct Spinner { angle: f32 }
///
/// impl Controlled for Spinner {
///     fn phases(&self) -> PhaseSet {
///         PhaseSet::only(Phase::Update)
///     }
///
///     fn update(&mut self, ctx: &PhaseContext<'_>) {
///         self.angle += ctx.delta_time();
///     }
/// }
/// ```
pub trait Controlled: 'static {
    /// The phases this registrant takes part in. Read once, at handle creation.
    fn phases(&self) -> PhaseSet;

    /// Regular per-frame update.
    fn update(&mut self, _ctx: &PhaseContext<'_>) {}

    /// Late update, after every regular update of the frame.
    fn late_update(&mut self, _ctx: &PhaseContext<'_>) {}

    /// Fixed-rate update; `ctx.delta_time()` is the fixed timestep.
    fn fixed_update(&mut self, _ctx: &PhaseContext<'_>) {}

    /// Diagnostic update, only driven in non-release builds.
    fn debug_update(&mut self, _ctx: &PhaseContext<'_>) {}
}

/// Shared, identity-compared handle to a registrant.
///
/// Two handles are equal when they point at the same allocation, so a handle
/// can be cloned freely into buckets and back out to unregister.
#[derive(Clone)]
pub struct ControlledHandle {
    inner: Rc<RefCell<dyn Controlled>>,
    key: TypeKey,
    phases: PhaseSet,
}

impl ControlledHandle {
    /// Wraps a registrant, keyed by its concrete type.
    #[must_use]
    pub fn new<C: Controlled>(value: C) -> Self {
        Self::from_shared(Rc::new(RefCell::new(value)))
    }

    /// Wraps an existing shared registrant, keyed by its concrete type.
    ///
    /// The caller keeps typed access through its own `Rc`.
    #[must_use]
    pub fn from_shared<C: Controlled>(shared: Rc<RefCell<C>>) -> Self {
        Self::from_dyn(TypeKey::of::<C>(), shared)
    }

    /// Wraps a registrant under an explicit type key.
    ///
    /// Used by relays that stand in for another type in a declared order.
    #[must_use]
    pub fn keyed<C: Controlled>(key: TypeKey, value: C) -> Self {
        Self::from_dyn(key, Rc::new(RefCell::new(value)))
    }

    pub(crate) fn from_dyn(key: TypeKey, inner: Rc<RefCell<dyn Controlled>>) -> Self {
        let phases = inner.borrow().phases();
        Self { inner, key, phases }
    }

    /// The type key used to pick the registrant's bucket.
    #[inline]
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// The phases the registrant declared at creation.
    #[inline]
    #[must_use]
    pub fn phases(&self) -> PhaseSet {
        self.phases
    }

    /// Returns true if both handles point at the same registrant.
    #[must_use]
    pub fn same_registrant(&self, other: &Self) -> bool {
        self.address() == other.address()
    }

    /// Invokes the callback for `ctx.phase()`.
    ///
    /// A registrant that is already mid-callback is skipped and reported
    /// instead of panicking on the double borrow.
    ///
    /// # Returns
    ///
    /// `true` if the callback ran.
    pub fn invoke(&self, ctx: &PhaseContext<'_>) -> bool {
        let Ok(mut registrant) = self.inner.try_borrow_mut() else {
            usage::report(&CoreError::ReentrantCallback {
                type_name: self.key.name(),
                phase: ctx.phase(),
            });
            return false;
        };
        match ctx.phase() {
            Phase::Update => registrant.update(ctx),
            Phase::LateUpdate => registrant.late_update(ctx),
            Phase::FixedUpdate => registrant.fixed_update(ctx),
            Phase::DebugUpdate => registrant.debug_update(ctx),
        }
        true
    }

    fn address(&self) -> *const () {
        Rc::as_ptr(&self.inner).cast::<()>()
    }
}

impl PartialEq for ControlledHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_registrant(other)
    }
}

impl Eq for ControlledHandle {}

impl Hash for ControlledHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for ControlledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlledHandle")
            .field("type", &self.key.short_name())
            .field("phases", &self.phases)
            .field("address", &self.address())
            .finish()
    }
}

impl fmt::Display for ControlledHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:p}", self.key.short_name(), self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Controlled for Idle {
        fn phases(&self) -> PhaseSet {
            PhaseSet::only(Phase::LateUpdate)
        }
    }

    #[test]
    fn test_handles_compare_by_identity() {
        let a = ControlledHandle::new(Idle);
        let b = ControlledHandle::new(Idle);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_handle_caches_phases_and_key() {
        let shared = Rc::new(RefCell::new(Idle));
        let handle = ControlledHandle::from_shared(Rc::clone(&shared));
        assert_eq!(handle.phases(), PhaseSet::only(Phase::LateUpdate));
        assert_eq!(handle.type_key(), TypeKey::of::<Idle>());

        let relay = ControlledHandle::keyed(TypeKey::of::<u8>(), Idle);
        assert_eq!(relay.type_key(), TypeKey::of::<u8>());
    }
}
