//! # Service Registry
//!
//! An explicitly owned catalog of singleton services.
//!
//! ```text
//!                 setup                first qualifying get
//!   Undeclared    Inactive ──────────────────────────────────> Live
//!                    ^   (Eager: at setup, in declared order)    │
//!                    └──────────────── teardown ─────────────────┘
//! ```
//!
//! The registry owns a [`PhaseDispatcher`] whose declared order is the service
//! order, so live services receive phase callbacks in the order they were
//! declared. The registry itself joins an outer dispatcher through
//! [`ServiceRegistry::relay`].

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::CoreError;
use crate::frame::{FrameClock, FrameStamp};
use crate::schedule::{Controlled, ControlledHandle, Phase, PhaseContext, PhaseDispatcher, PhaseSet, TypeKey};
use crate::usage;

use super::descriptor::ServiceDescriptor;
use super::service::{ConstructionPolicy, PollMode, Service};

/// Label of every registry's inner dispatcher.
const REGISTRY_LABEL: &str = "ServiceRegistry";

/// Lifecycle state of one service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Not in the declared order.
    Undeclared,
    /// Declared, no live instance.
    Inactive,
    /// Constructed and tracked by the registry.
    Live,
}

struct LiveService {
    any: Rc<dyn std::any::Any>,
    service: Rc<RefCell<dyn Service>>,
    handle: ControlledHandle,
    /// False until `initialise` ran, and again after `invalidate`.
    initialised: bool,
    /// Whether the handle is registered with the inner dispatcher.
    enabled: bool,
    poll_mode: PollMode,
}

/// Owner of declared services and their live instances.
///
/// All operations take `&self` so that services can be queried from inside
/// their own phase callbacks through [`PhaseContext::services`].
pub struct ServiceRegistry {
    descriptors: Vec<ServiceDescriptor>,
    index: HashMap<TypeId, usize>,
    dispatcher: PhaseDispatcher,
    live: RefCell<HashMap<TypeId, LiveService>>,
    throttle_stamps: RefCell<HashMap<TypeId, FrameStamp>>,
    /// Teardown hooks of services that were torn down from inside one of
    /// their own callbacks. Run once the service is released.
    pending_teardowns: RefCell<Vec<(TypeKey, Rc<RefCell<dyn Service>>)>>,
}

impl ServiceRegistry {
    /// Sets up a registry with its own frame clock and constructs every active
    /// eager service in declared order.
    #[must_use]
    pub fn new(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Rc<Self> {
        Self::with_clock(descriptors, FrameClock::new())
    }

    /// Sets up a registry stamping throttles and callbacks with `clock`.
    ///
    /// Duplicate service types are reported and only the first descriptor is
    /// kept.
    #[must_use]
    pub fn with_clock(
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
        clock: FrameClock,
    ) -> Rc<Self> {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for descriptor in descriptors {
            if seen.insert(descriptor.key().id()) {
                kept.push(descriptor);
            } else {
                usage::report_config(&CoreError::DuplicateDeclaredType {
                    type_name: descriptor.key().name(),
                    owner: REGISTRY_LABEL.to_owned(),
                });
            }
        }

        let index = kept
            .iter()
            .enumerate()
            .map(|(position, descriptor)| (descriptor.key().id(), position))
            .collect();
        let dispatcher = PhaseDispatcher::with_clock(
            REGISTRY_LABEL,
            kept.iter().map(ServiceDescriptor::key),
            clock,
        );

        let registry = Rc::new(Self {
            descriptors: kept,
            index,
            dispatcher,
            live: RefCell::new(HashMap::new()),
            throttle_stamps: RefCell::new(HashMap::new()),
            pending_teardowns: RefCell::new(Vec::new()),
        });

        tracing::debug!("creating eager service instances");
        for descriptor in &registry.descriptors {
            if descriptor.is_active() && descriptor.construction_policy() == ConstructionPolicy::Eager {
                registry.construct(descriptor);
            }
        }
        tracing::info!(
            declared = registry.descriptors.len(),
            live = registry.live_count(),
            "service registry ready"
        );

        registry
    }

    /// Returns the live instance of `S`, constructing it if the descriptor
    /// allows it.
    ///
    /// A stale instance (see [`ServiceRegistry::invalidate`]) is initialised
    /// again first. Applies the poll throttle.
    ///
    /// # Returns
    ///
    /// None if `S` is undeclared, inactive, or eager and no longer live.
    pub fn get<S: Service>(&self) -> Option<Rc<RefCell<S>>> {
        let key = TypeKey::of::<S>();
        let initialised = self.live.borrow().get(&key.id()).map(|entry| entry.initialised);

        match initialised {
            Some(true) => {}
            Some(false) => {
                self.run_initialise(key);
            }
            None => {
                let descriptor = self.descriptor(key)?;
                if !descriptor.is_active() || !descriptor.construction_policy().is_on_demand() {
                    return None;
                }
                if descriptor.construction_policy() == ConstructionPolicy::OnDemandWithWarning {
                    tracing::warn!(service = %key, "initialising service on demand");
                }
                if !self.construct(descriptor) {
                    return None;
                }
            }
        }

        self.poll(key);
        self.typed(key)
    }

    /// Returns the live, initialised instance of `S` without constructing.
    ///
    /// Applies the poll throttle.
    pub fn try_get<S: Service>(&self) -> Option<Rc<RefCell<S>>> {
        let key = TypeKey::of::<S>();
        let initialised = self.live.borrow().get(&key.id()).map(|entry| entry.initialised)?;
        if !initialised {
            return None;
        }
        self.poll(key);
        self.typed(key)
    }

    /// Drops the live instance of `S`: unregisters its callbacks, clears its
    /// throttle stamp and runs [`Service::teardown`].
    ///
    /// # Returns
    ///
    /// `false` if `S` was not live.
    pub fn teardown<S: Service>(&self) -> bool {
        self.teardown_key(TypeKey::of::<S>())
    }

    /// Tears down every live service in reverse declared order.
    pub fn teardown_all(&self) {
        for descriptor in self.descriptors.iter().rev() {
            self.teardown_key(descriptor.key());
        }
    }

    /// Marks the live instance of `S` stale. The next `get` re-runs
    /// [`Service::initialise`]; `try_get` ignores it until then.
    pub fn invalidate<S: Service>(&self) -> bool {
        let key = TypeKey::of::<S>();
        let mut live = self.live.borrow_mut();
        let Some(entry) = live.get_mut(&key.id()) else {
            return false;
        };
        entry.initialised = false;
        true
    }

    /// Re-runs [`Service::initialise`] on the live instance of `S` now.
    pub fn reinitialise<S: Service>(&self) -> bool {
        self.run_initialise(TypeKey::of::<S>())
    }

    /// Enables or disables phase callbacks of the live instance of `S`.
    ///
    /// # Returns
    ///
    /// `false` if `S` is not live.
    pub fn set_enabled<S: Service>(&self, enabled: bool) -> bool {
        self.set_listeners(TypeKey::of::<S>(), enabled)
    }

    /// Returns true if the live instance of `S` receives phase callbacks.
    #[must_use]
    pub fn is_enabled<S: Service>(&self) -> bool {
        self.live
            .borrow()
            .get(&TypeId::of::<S>())
            .is_some_and(|entry| entry.enabled)
    }

    /// Lifecycle state of `S`.
    #[must_use]
    pub fn state<S: Service>(&self) -> ServiceState {
        self.state_of(TypeKey::of::<S>())
    }

    /// Lifecycle state of the service type `key`.
    #[must_use]
    pub fn state_of(&self, key: TypeKey) -> ServiceState {
        if self.live.borrow().contains_key(&key.id()) {
            ServiceState::Live
        } else if self.index.contains_key(&key.id()) {
            ServiceState::Inactive
        } else {
            ServiceState::Undeclared
        }
    }

    /// Returns true if `S` has a live instance.
    #[must_use]
    pub fn is_live<S: Service>(&self) -> bool {
        self.state::<S>() == ServiceState::Live
    }

    /// Number of live services.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    /// Live service types, in declared order.
    #[must_use]
    pub fn live_types(&self) -> Vec<TypeKey> {
        let live = self.live.borrow();
        self.descriptors
            .iter()
            .map(ServiceDescriptor::key)
            .filter(|key| live.contains_key(&key.id()))
            .collect()
    }

    /// The declared order, after duplicate removal.
    #[must_use]
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Descriptor of `key`, if declared.
    #[must_use]
    pub fn descriptor(&self, key: TypeKey) -> Option<&ServiceDescriptor> {
        self.index
            .get(&key.id())
            .and_then(|&position| self.descriptors.get(position))
    }

    /// The dispatcher driving live services.
    #[must_use]
    pub fn dispatcher(&self) -> &PhaseDispatcher {
        &self.dispatcher
    }

    /// One line per declared service: `Name: [ACTIVE: policy]` or
    /// `Name: [inactive]`.
    #[must_use]
    pub fn describe(&self) -> String {
        self.descriptors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Runs `phase` for every enabled live service, in declared order.
    ///
    /// Teardown hooks deferred by services that tore themselves down during
    /// the phase run before this returns.
    pub fn run_phase(&self, phase: Phase, delta_time: f32) -> usize {
        let invoked = self.dispatcher.run_phase_with(phase, delta_time, Some(self));
        self.flush_teardowns();
        invoked
    }

    /// Number of teardown hooks waiting for their service to be released.
    #[must_use]
    pub fn pending_teardowns(&self) -> usize {
        self.pending_teardowns.borrow().len()
    }

    /// A registrant that forwards every phase of an outer dispatcher into this
    /// registry. Keyed by the registry's own type, so the outer declared order
    /// decides where services run.
    ///
    /// The relay holds a weak reference; once the registry is dropped it does
    /// nothing.
    #[must_use]
    pub fn relay(self: &Rc<Self>) -> ControlledHandle {
        ControlledHandle::keyed(
            TypeKey::of::<Self>(),
            ServiceRelay {
                registry: Rc::downgrade(self),
            },
        )
    }

    fn construct(&self, descriptor: &ServiceDescriptor) -> bool {
        let key = descriptor.key();
        if self.live.borrow().contains_key(&key.id()) {
            usage::report(&CoreError::ServiceAlreadyLive { type_name: key.name() });
            return false;
        }

        tracing::debug!(service = %key, preset = descriptor.has_preset(), "creating service instance");
        let parts = descriptor.construct();
        let entry = LiveService {
            any: parts.any,
            service: parts.service,
            handle: ControlledHandle::from_dyn(key, parts.controlled),
            initialised: false,
            enabled: false,
            poll_mode: PollMode::None,
        };
        self.live.borrow_mut().insert(key.id(), entry);
        self.run_initialise(key);
        true
    }

    fn run_initialise(&self, key: TypeKey) -> bool {
        let Some(service) = self.service_of(key) else {
            return false;
        };

        let mut settings = None;
        let ran = run_hook(key, &service, "initialise", |service| {
            service.initialise();
            settings = Some((service.starts_active(), service.poll_mode()));
        });
        let Some((starts_active, poll_mode)) = settings else {
            return ran;
        };

        if let Some(entry) = self.live.borrow_mut().get_mut(&key.id()) {
            entry.initialised = true;
            entry.poll_mode = poll_mode;
        }
        self.set_listeners(key, starts_active);
        ran
    }

    fn set_listeners(&self, key: TypeKey, enabled: bool) -> bool {
        let handle = {
            let mut live = self.live.borrow_mut();
            let Some(entry) = live.get_mut(&key.id()) else {
                return false;
            };
            if entry.enabled == enabled {
                return true;
            }
            entry.enabled = enabled;
            entry.handle.clone()
        };

        if handle.phases().is_empty() {
            return true;
        }
        if enabled {
            self.dispatcher.register(&handle);
        } else {
            self.dispatcher.unregister(&handle);
        }
        true
    }

    fn teardown_key(&self, key: TypeKey) -> bool {
        let removed = self.live.borrow_mut().remove(&key.id());
        let Some(entry) = removed else {
            return false;
        };

        if entry.enabled && !entry.handle.phases().is_empty() {
            self.dispatcher.unregister(&entry.handle);
        }
        self.throttle_stamps.borrow_mut().remove(&key.id());
        if try_hook(&entry.service, |service| service.teardown()) {
            tracing::debug!(service = %key, "service torn down");
        } else {
            tracing::debug!(service = %key, "service torn down; teardown hook deferred until released");
            self.pending_teardowns.borrow_mut().push((key, entry.service));
        }
        true
    }

    fn flush_teardowns(&self) {
        let pending = std::mem::take(&mut *self.pending_teardowns.borrow_mut());
        if pending.is_empty() {
            return;
        }

        let mut still_busy = Vec::new();
        for (key, service) in pending {
            if try_hook(&service, |service| service.teardown()) {
                tracing::debug!(service = %key, "deferred teardown hook ran");
            } else {
                still_busy.push((key, service));
            }
        }
        self.pending_teardowns.borrow_mut().extend(still_busy);
    }

    fn poll(&self, key: TypeKey) {
        let found = self
            .live
            .borrow()
            .get(&key.id())
            .map(|entry| (Rc::clone(&entry.service), entry.poll_mode));
        let Some((service, mode)) = found else {
            return;
        };

        let now = self.dispatcher.clock().now();
        match mode {
            PollMode::None => return,
            PollMode::OnPoll => {}
            PollMode::OnPollOncePerFrame => {
                if self.throttle_stamps.borrow().get(&key.id()) == Some(&now) {
                    return;
                }
            }
        }

        // A skipped hook leaves the frame's poll available.
        let ran = run_hook(key, &service, "on_poll", |service| service.on_poll());
        if ran && mode == PollMode::OnPollOncePerFrame {
            self.throttle_stamps.borrow_mut().insert(key.id(), now);
        }
    }

    fn service_of(&self, key: TypeKey) -> Option<Rc<RefCell<dyn Service>>> {
        self.live
            .borrow()
            .get(&key.id())
            .map(|entry| Rc::clone(&entry.service))
    }

    fn typed<S: Service>(&self, key: TypeKey) -> Option<Rc<RefCell<S>>> {
        let any = self.live.borrow().get(&key.id()).map(|entry| Rc::clone(&entry.any))?;
        any.downcast::<RefCell<S>>().ok()
    }
}

/// Runs a lifecycle hook, skipping it (and reporting) if the service is
/// already borrowed, e.g. by its own phase callback.
fn run_hook(
    key: TypeKey,
    service: &RefCell<dyn Service>,
    hook: &'static str,
    f: impl FnOnce(&mut dyn Service),
) -> bool {
    let ran = try_hook(service, f);
    if !ran {
        usage::report(&CoreError::ServiceBusy {
            type_name: key.name(),
            hook,
        });
    }
    ran
}

fn try_hook(service: &RefCell<dyn Service>, f: impl FnOnce(&mut dyn Service)) -> bool {
    let Ok(mut guard) = service.try_borrow_mut() else {
        return false;
    };
    f(&mut *guard);
    true
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("descriptors", &self.descriptors)
            .field("live", &self.live_types())
            .finish_non_exhaustive()
    }
}

/// Outer-dispatcher registrant standing in for a [`ServiceRegistry`].
struct ServiceRelay {
    registry: Weak<ServiceRegistry>,
}

impl ServiceRelay {
    fn forward(&self, ctx: &PhaseContext<'_>) {
        if let Some(registry) = self.registry.upgrade() {
            registry.run_phase(ctx.phase(), ctx.delta_time());
        }
    }
}

impl Controlled for ServiceRelay {
    fn phases(&self) -> PhaseSet {
        PhaseSet::all()
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        self.forward(ctx);
    }

    fn late_update(&mut self, ctx: &PhaseContext<'_>) {
        self.forward(ctx);
    }

    fn fixed_update(&mut self, ctx: &PhaseContext<'_>) {
        self.forward(ctx);
    }

    fn debug_update(&mut self, ctx: &PhaseContext<'_>) {
        self.forward(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone)]
    struct Counter {
        initialised: u32,
        polls: u32,
        torn_down: bool,
    }

    impl Controlled for Counter {
        fn phases(&self) -> PhaseSet {
            PhaseSet::empty()
        }
    }

    impl Service for Counter {
        fn initialise(&mut self) {
            self.initialised += 1;
        }

        fn poll_mode(&self) -> PollMode {
            PollMode::OnPollOncePerFrame
        }

        fn on_poll(&mut self) {
            self.polls += 1;
        }

        fn teardown(&mut self) {
            self.torn_down = true;
        }
    }

    #[derive(Default)]
    struct Dormant;

    impl Controlled for Dormant {
        fn phases(&self) -> PhaseSet {
            PhaseSet::only(Phase::Update)
        }
    }

    impl Service for Dormant {
        fn starts_active(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_on_demand_constructs_once() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Counter>().policy(ConstructionPolicy::OnDemand),
        ]);

        assert!(registry.try_get::<Counter>().is_none());
        let first = registry.get::<Counter>().unwrap();
        for _ in 0..5 {
            let again = registry.get::<Counter>().unwrap();
            assert!(Rc::ptr_eq(&first, &again));
        }
        assert_eq!(first.borrow().initialised, 1);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_inactive_and_undeclared_return_none() {
        let registry = ServiceRegistry::new([ServiceDescriptor::of::<Counter>().active(false)]);
        assert!(registry.get::<Counter>().is_none());
        assert!(registry.get::<Dormant>().is_none());
        assert_eq!(registry.state::<Counter>(), ServiceState::Inactive);
        assert_eq!(registry.state::<Dormant>(), ServiceState::Undeclared);
    }

    #[test]
    fn test_poll_once_per_frame() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Counter>().policy(ConstructionPolicy::Eager),
        ]);
        for _ in 0..4 {
            registry.try_get::<Counter>();
        }
        let counter = registry.get::<Counter>().unwrap();
        assert_eq!(counter.borrow().polls, 1);

        registry.dispatcher().clock().advance();
        registry.try_get::<Counter>();
        registry.try_get::<Counter>();
        assert_eq!(counter.borrow().polls, 2);
    }

    #[test]
    fn test_invalidate_then_get_reinitialises() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Counter>().policy(ConstructionPolicy::Eager),
        ]);
        assert!(registry.invalidate::<Counter>());
        assert!(registry.try_get::<Counter>().is_none());

        let counter = registry.get::<Counter>().unwrap();
        assert_eq!(counter.borrow().initialised, 2);
    }

    #[test]
    fn test_teardown_eager_is_not_rebuilt() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Counter>().policy(ConstructionPolicy::Eager),
        ]);
        let counter = registry.get::<Counter>().unwrap();
        assert!(registry.teardown::<Counter>());
        assert!(counter.borrow().torn_down);
        assert!(!registry.teardown::<Counter>());
        assert!(registry.get::<Counter>().is_none());
        assert_eq!(registry.state::<Counter>(), ServiceState::Inactive);
    }

    #[test]
    fn test_starts_inactive_until_enabled() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Dormant>().policy(ConstructionPolicy::Eager),
        ]);
        assert!(registry.is_live::<Dormant>());
        assert!(!registry.is_enabled::<Dormant>());
        assert_eq!(registry.run_phase(Phase::Update, 0.1), 0);

        assert!(registry.set_enabled::<Dormant>(true));
        assert_eq!(registry.run_phase(Phase::Update, 0.1), 1);
    }

    #[test]
    fn test_duplicate_descriptor_keeps_first() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Counter>().policy(ConstructionPolicy::OnDemand),
            ServiceDescriptor::of::<Counter>().active(false),
        ]);
        assert_eq!(registry.descriptors().len(), 1);
        assert_eq!(registry.describe(), "Counter: [ACTIVE: on_demand]");
    }

    #[derive(Default, Clone)]
    struct Quitter {
        teardowns: Rc<std::cell::Cell<u32>>,
    }

    impl Controlled for Quitter {
        fn phases(&self) -> PhaseSet {
            PhaseSet::only(Phase::Update)
        }

        fn update(&mut self, ctx: &PhaseContext<'_>) {
            assert!(ctx.services().unwrap().teardown::<Self>());
        }
    }

    impl Service for Quitter {
        fn teardown(&mut self) {
            self.teardowns.set(self.teardowns.get() + 1);
        }
    }

    #[test]
    fn test_self_teardown_runs_hook_after_callback() {
        let teardowns = Rc::new(std::cell::Cell::new(0));
        let registry = ServiceRegistry::new([ServiceDescriptor::from_preset(Quitter {
            teardowns: Rc::clone(&teardowns),
        })
        .policy(ConstructionPolicy::Eager)]);

        assert_eq!(registry.run_phase(Phase::Update, 0.1), 1);
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.pending_teardowns(), 0);
        assert_eq!(teardowns.get(), 1);

        assert_eq!(registry.run_phase(Phase::Update, 0.1), 0);
        assert_eq!(teardowns.get(), 1);
    }

    #[derive(Default, Clone)]
    struct Echo {
        polls: u32,
    }

    impl Controlled for Echo {
        fn phases(&self) -> PhaseSet {
            PhaseSet::only(Phase::Update)
        }

        fn update(&mut self, ctx: &PhaseContext<'_>) {
            // Polling itself mid-callback cannot run the hook.
            assert!(ctx.services().and_then(ServiceRegistry::get::<Self>).is_some());
        }
    }

    impl Service for Echo {
        fn poll_mode(&self) -> PollMode {
            PollMode::OnPollOncePerFrame
        }

        fn on_poll(&mut self) {
            self.polls += 1;
        }
    }

    #[test]
    fn test_skipped_poll_leaves_frame_poll_available() {
        let registry = ServiceRegistry::new([
            ServiceDescriptor::of::<Echo>().policy(ConstructionPolicy::Eager),
        ]);
        registry.dispatcher().clock().advance();

        assert_eq!(registry.run_phase(Phase::Update, 0.1), 1);
        let echo = registry.get::<Echo>().unwrap();
        assert_eq!(echo.borrow().polls, 1);

        registry.get::<Echo>();
        assert_eq!(echo.borrow().polls, 1);
    }
}
