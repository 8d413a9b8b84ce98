//! # Service Descriptors
//!
//! Static, per-service configuration: which type, whether it is active, when it
//! is constructed, and what template (if any) each instance is cloned from.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::schedule::{Controlled, TypeKey};

use super::service::{ConstructionPolicy, Service};

/// One freshly constructed service, erased three ways.
pub(crate) struct ServiceParts {
    /// Typed access (downcast to `RefCell<S>`).
    pub(crate) any: Rc<dyn Any>,
    /// Lifecycle hooks.
    pub(crate) service: Rc<RefCell<dyn Service>>,
    /// Phase callbacks.
    pub(crate) controlled: Rc<RefCell<dyn Controlled>>,
}

impl ServiceParts {
    fn of<S: Service>(value: S) -> Self {
        let shared = Rc::new(RefCell::new(value));
        Self {
            any: Rc::clone(&shared) as Rc<dyn Any>,
            service: Rc::clone(&shared) as Rc<RefCell<dyn Service>>,
            controlled: shared,
        }
    }
}

type Factory = Rc<dyn Fn() -> ServiceParts>;

/// Configuration of one service in a registry's declared order.
///
/// # Example
///
/// ```rust
/// use orrery_core::{ConstructionPolicy, Controlled, PhaseSet, Service, ServiceDescriptor};
///
/// #[derive(Default, Clone)]
/// struct Audio { volume: f32 }
///
/// impl Controlled for Audio {
///     fn phases(&self) -> PhaseSet { PhaseSet::empty() }
/// }
/// impl Service for Audio {}
///
/// let quiet = ServiceDescriptor::from_preset(Audio { volume: 0.2 })
///     .policy(ConstructionPolicy::OnDemand);
/// assert!(quiet.has_preset());
/// assert_eq!(quiet.to_string(), "Audio: [ACTIVE: on_demand]");
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    key: TypeKey,
    active: bool,
    policy: ConstructionPolicy,
    has_preset: bool,
    factory: Factory,
}

impl ServiceDescriptor {
    /// Active descriptor that default-constructs `S`.
    #[must_use]
    pub fn of<S: Service + Default>() -> Self {
        Self::with_factory(TypeKey::of::<S>(), false, Rc::new(|| ServiceParts::of(S::default())))
    }

    /// Active descriptor whose instances are clones of `preset`.
    #[must_use]
    pub fn from_preset<S: Service + Clone>(preset: S) -> Self {
        Self::with_factory(
            TypeKey::of::<S>(),
            true,
            Rc::new(move || ServiceParts::of(preset.clone())),
        )
    }

    fn with_factory(key: TypeKey, has_preset: bool, factory: Factory) -> Self {
        Self {
            key,
            active: true,
            policy: ConstructionPolicy::default(),
            has_preset,
            factory,
        }
    }

    /// Sets whether the service may be constructed at all.
    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Sets the construction policy.
    #[must_use]
    pub fn policy(mut self, policy: ConstructionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The service type.
    #[inline]
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Returns true if the service may be constructed.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The construction policy.
    #[inline]
    #[must_use]
    pub fn construction_policy(&self) -> ConstructionPolicy {
        self.policy
    }

    /// Returns true if instances are cloned from a template.
    #[inline]
    #[must_use]
    pub fn has_preset(&self) -> bool {
        self.has_preset
    }

    pub(crate) fn construct(&self) -> ServiceParts {
        (self.factory)()
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.active {
            write!(f, "{}: [ACTIVE: {}]", self.key.short_name(), self.policy)
        } else {
            write!(f, "{}: [inactive]", self.key.short_name())
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("active", &self.active)
            .field("policy", &self.policy)
            .field("has_preset", &self.has_preset)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::PhaseSet;

    #[derive(Default, Clone)]
    struct Input {
        sensitivity: u32,
    }

    impl Controlled for Input {
        fn phases(&self) -> PhaseSet {
            PhaseSet::empty()
        }
    }

    impl Service for Input {}

    #[test]
    fn test_preset_is_cloned_per_instance() {
        let descriptor = ServiceDescriptor::from_preset(Input { sensitivity: 7 });
        let first = descriptor.construct();
        let second = descriptor.construct();

        let first = first.any.downcast::<RefCell<Input>>().ok().unwrap();
        let second = second.any.downcast::<RefCell<Input>>().ok().unwrap();
        first.borrow_mut().sensitivity = 1;
        assert_eq!(second.borrow().sensitivity, 7);
    }

    #[test]
    fn test_describe_inactive() {
        let descriptor = ServiceDescriptor::of::<Input>()
            .active(false)
            .policy(ConstructionPolicy::Eager);
        assert_eq!(descriptor.to_string(), "Input: [inactive]");
        assert!(!descriptor.has_preset());
    }
}
