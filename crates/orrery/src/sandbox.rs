//! # Sandbox
//!
//! A small, deterministic world wired entirely from a manifest.
//!
//! ## Services
//! - `Clock`: accumulates frame and fixed-step time (eager)
//! - `Audio`: counts the cues it was asked to play (on demand, volume preset)
//! - `Input`: polled on every access (eager)
//! - `StormTimer`: polled once per frame, calls a storm every `interval` polls
//!
//! ## Registrants
//! - `Launcher` (LateUpdate): spawns a `Satellite` every few frames unless a
//!   storm is due
//! - `Satellite` (Update): lives for a fixed number of updates, then
//!   unregisters itself and asks `Audio` for a cue
//!
//! Every launch, expiry and storm is published on an [`EventBus`] and tallied.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use orrery_config::{ConfigResult, Manifest, TypeCatalog};
use orrery_core::{
    Controlled, ControlledHandle, EventBus, EventContext, FrameStamp, Phase, PhaseContext,
    PhaseSet, PollMode, Service, ServiceRegistry, SubscriptionId, TypeKey,
};
use serde::Deserialize;

use crate::game_loop::{GameLoop, GameLoopConfig};

/// Manifest used when the sandbox is started without one.
pub const DEFAULT_MANIFEST: &str = r#"
[dispatch]
order = ["ServiceRegistry", "Satellite", "Launcher"]

[[services]]
name = "Clock"
policy = "eager"

[[services]]
name = "Audio"
policy = "on_demand"
preset = { volume = 0.8 }

[[services]]
name = "Input"
policy = "eager"

[[services]]
name = "StormTimer"
policy = "on_demand_with_warning"
preset = { interval = 5 }
"#;

/// Frames between launches.
pub const LAUNCH_INTERVAL: FrameStamp = 3;

/// Updates a satellite lives for.
pub const SATELLITE_LIFETIME: u32 = 4;

// =============================================================================
// SERVICES
// =============================================================================

/// Accumulated simulation time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Clock {
    /// Seconds of regular update time.
    pub elapsed: f32,
    /// Fixed steps taken.
    #[serde(skip)]
    pub fixed_steps: u64,
}

impl Controlled for Clock {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update).with(Phase::FixedUpdate)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        self.elapsed += ctx.delta_time();
    }

    fn fixed_update(&mut self, _ctx: &PhaseContext<'_>) {
        self.fixed_steps += 1;
    }
}

impl Service for Clock {}

/// Cue player.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Audio {
    /// Output volume in `0.0..=1.0`.
    pub volume: f32,
    /// Cues requested since the last update.
    #[serde(skip)]
    pending: u32,
    /// Cues played.
    #[serde(skip)]
    played: u32,
}

impl Default for Audio {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pending: 0,
            played: 0,
        }
    }
}

impl Audio {
    /// Queues a cue for the next update.
    pub fn play(&mut self) {
        self.pending += 1;
    }

    /// Cues requested so far, played or not.
    #[must_use]
    pub fn requested(&self) -> u32 {
        self.played + self.pending
    }

    /// Cues played so far.
    #[must_use]
    pub fn played(&self) -> u32 {
        self.played
    }
}

impl Controlled for Audio {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update)
    }

    fn update(&mut self, _ctx: &PhaseContext<'_>) {
        if self.pending > 0 {
            tracing::debug!(cues = self.pending, volume = self.volume, "playing cues");
            self.played += self.pending;
            self.pending = 0;
        }
    }
}

impl Service for Audio {
    fn initialise(&mut self) {
        self.volume = self.volume.clamp(0.0, 1.0);
    }

    fn teardown(&mut self) {
        self.pending = 0;
    }
}

/// Device sampler. Every access through the registry counts as a poll.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Input {
    /// Registry accesses.
    #[serde(skip)]
    pub polls: u64,
    /// Update and fixed-update samples taken.
    #[serde(skip)]
    pub samples: u64,
    /// Clock time seen by the last regular update.
    #[serde(skip)]
    pub last_seen_elapsed: f32,
}

impl Controlled for Input {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update).with(Phase::FixedUpdate)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        self.samples += 1;
        if let Some(clock) = ctx.services().and_then(ServiceRegistry::try_get::<Clock>) {
            self.last_seen_elapsed = clock.borrow().elapsed;
        }
    }

    fn fixed_update(&mut self, _ctx: &PhaseContext<'_>) {
        self.samples += 1;
    }
}

impl Service for Input {
    fn poll_mode(&self) -> PollMode {
        PollMode::OnPoll
    }

    fn on_poll(&mut self) {
        self.polls += 1;
    }
}

/// Storm schedule: a storm is due on every `interval`-th frame it is polled in.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StormTimer {
    /// Polled frames between storms. 0 disables storms.
    pub interval: u64,
    /// Frames polled so far.
    #[serde(skip)]
    polled_frames: u64,
}

impl Default for StormTimer {
    fn default() -> Self {
        Self {
            interval: 10,
            polled_frames: 0,
        }
    }
}

impl StormTimer {
    /// Returns true if the current polled frame is a storm frame.
    #[must_use]
    pub fn storm_due(&self) -> bool {
        self.interval > 0 && self.polled_frames > 0 && self.polled_frames % self.interval == 0
    }

    /// Frames polled so far.
    #[must_use]
    pub fn polled_frames(&self) -> u64 {
        self.polled_frames
    }
}

impl Controlled for StormTimer {
    fn phases(&self) -> PhaseSet {
        PhaseSet::empty()
    }
}

impl Service for StormTimer {
    fn poll_mode(&self) -> PollMode {
        PollMode::OnPollOncePerFrame
    }

    fn on_poll(&mut self) {
        self.polled_frames += 1;
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Event kinds published by the sandbox. The payload is a satellite id, or
/// the frame stamp for storms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SandboxEvent {
    /// A satellite was launched.
    Launched,
    /// A satellite expired and left the dispatch.
    Expired,
    /// A launch was skipped because a storm was due.
    StormWarning,
}

/// Running totals of the published events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxTally {
    /// Satellites launched.
    pub launched: u32,
    /// Satellites expired.
    pub expired: u32,
    /// Storm warnings.
    pub storms: u32,
}

impl SandboxTally {
    /// Satellites launched and not yet expired.
    #[must_use]
    pub fn in_flight(&self) -> u32 {
        self.launched.saturating_sub(self.expired)
    }
}

impl fmt::Display for SandboxTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "launched {}, expired {}, in flight {}, storms {}",
            self.launched,
            self.expired,
            self.in_flight(),
            self.storms
        )
    }
}

type SandboxBus = EventBus<SandboxEvent, u32>;

// =============================================================================
// REGISTRANTS
// =============================================================================

/// Short-lived registrant.
pub struct Satellite {
    id: u32,
    remaining: u32,
    events: Rc<SandboxBus>,
}

impl Satellite {
    /// Reads input through the registry, which polls it.
    fn sample_input(ctx: &PhaseContext<'_>) -> Option<u64> {
        ctx.services()
            .and_then(ServiceRegistry::get::<Input>)
            .map(|input| input.borrow().samples)
    }
}

impl Controlled for Satellite {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::Update)
    }

    fn update(&mut self, ctx: &PhaseContext<'_>) {
        if let Some(samples) = Self::sample_input(ctx) {
            tracing::trace!(satellite = self.id, samples, "input sampled");
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return;
        }

        ctx.unregister_self();
        self.events
            .publish_from(TypeKey::of::<Self>(), SandboxEvent::Expired, self.id);
        if let Some(audio) = ctx.services().and_then(ServiceRegistry::get::<Audio>) {
            audio.borrow_mut().play();
        }
    }
}

/// Spawns satellites.
pub struct Launcher {
    next_id: u32,
    events: Rc<SandboxBus>,
}

impl Launcher {
    fn storm_due(ctx: &PhaseContext<'_>) -> bool {
        ctx.services()
            .and_then(ServiceRegistry::get::<StormTimer>)
            .is_some_and(|timer| timer.borrow().storm_due())
    }
}

impl Controlled for Launcher {
    fn phases(&self) -> PhaseSet {
        PhaseSet::only(Phase::LateUpdate).with(Phase::DebugUpdate)
    }

    fn late_update(&mut self, ctx: &PhaseContext<'_>) {
        if ctx.frame() % LAUNCH_INTERVAL != 0 {
            return;
        }

        if Self::storm_due(ctx) {
            let frame = u32::try_from(ctx.frame()).unwrap_or(u32::MAX);
            self.events
                .publish_from(TypeKey::of::<Self>(), SandboxEvent::StormWarning, frame);
            return;
        }

        let id = self.next_id;
        self.next_id += 1;
        ctx.register(&ControlledHandle::new(Satellite {
            id,
            remaining: SATELLITE_LIFETIME,
            events: Rc::clone(&self.events),
        }));
        self.events
            .publish_from(TypeKey::of::<Self>(), SandboxEvent::Launched, id);
    }

    fn debug_update(&mut self, ctx: &PhaseContext<'_>) {
        tracing::trace!(
            frame = ctx.frame(),
            satellites = ctx.dispatcher().registered_count(Phase::Update),
            "launcher"
        );
    }
}

// =============================================================================
// SANDBOX
// =============================================================================

/// A game loop, its service registry and the sandbox event bus.
pub struct Sandbox {
    game_loop: GameLoop,
    services: Rc<ServiceRegistry>,
    events: Rc<SandboxBus>,
    tally: Rc<RefCell<SandboxTally>>,
    subscriptions: Vec<SubscriptionId>,
}

impl Sandbox {
    /// Catalog of every type a sandbox manifest may name.
    ///
    /// # Errors
    ///
    /// Only on a duplicate registration, which would be a programming error.
    pub fn catalog() -> ConfigResult<TypeCatalog> {
        let mut catalog = TypeCatalog::new();
        catalog.register_service::<Clock>("Clock")?;
        catalog.register_service::<Audio>("Audio")?;
        catalog.register_service::<Input>("Input")?;
        catalog.register_service::<StormTimer>("StormTimer")?;
        catalog.register_type::<Satellite>("Satellite")?;
        catalog.register_type::<Launcher>("Launcher")?;
        Ok(catalog)
    }

    /// Builds a sandbox from [`DEFAULT_MANIFEST`].
    ///
    /// # Errors
    ///
    /// See [`Sandbox::from_manifest`].
    pub fn with_default_manifest(config: GameLoopConfig) -> ConfigResult<Self> {
        Self::from_manifest(&Manifest::from_toml_str(DEFAULT_MANIFEST)?, config)
    }

    /// Builds a sandbox from a manifest.
    ///
    /// Eager services are constructed here, in manifest order. The registry
    /// shares the loop's frame clock and runs at `ServiceRegistry`'s position
    /// in the dispatch order.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`](orrery_config::ConfigError) from resolving the
    /// manifest against [`Sandbox::catalog`].
    pub fn from_manifest(manifest: &Manifest, config: GameLoopConfig) -> ConfigResult<Self> {
        let resolved = manifest.resolve(&Self::catalog()?)?;

        let mut game_loop = GameLoop::new(config, resolved.dispatch_order);
        let services = ServiceRegistry::with_clock(resolved.services, game_loop.clock().clone());
        game_loop.attach_services(Rc::clone(&services));

        let events: Rc<SandboxBus> = Rc::new(EventBus::new());
        let tally = Rc::new(RefCell::new(SandboxTally::default()));
        let subscriptions = [
            SandboxEvent::Launched,
            SandboxEvent::Expired,
            SandboxEvent::StormWarning,
        ]
        .into_iter()
        .map(|kind| {
            let tally = Rc::clone(&tally);
            events.subscribe(kind, move |ctx: &EventContext<SandboxEvent>, _: &u32| {
                let mut tally = tally.borrow_mut();
                match ctx.kind() {
                    SandboxEvent::Launched => tally.launched += 1,
                    SandboxEvent::Expired => tally.expired += 1,
                    SandboxEvent::StormWarning => tally.storms += 1,
                }
            })
        })
        .collect();

        game_loop.dispatcher().register(&ControlledHandle::new(Launcher {
            next_id: 0,
            events: Rc::clone(&events),
        }));

        tracing::info!(
            services = services.live_count(),
            "sandbox ready"
        );
        Ok(Self {
            game_loop,
            services,
            events,
            tally,
            subscriptions,
        })
    }

    /// Runs `frames` frames with a fixed delta time.
    pub fn run(&mut self, frames: u64, delta_time: f32) {
        for _ in 0..frames {
            self.game_loop.tick(delta_time);
        }
        tracing::debug!(frame = self.game_loop.frame_count(), tally = %self.tally(), "sandbox ran");
    }

    /// Tears every service down and drops the event subscriptions.
    pub fn shutdown(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.events.unsubscribe(id);
        }
        self.services.teardown_all();
        self.game_loop.detach_services();
        tracing::info!(tally = %self.tally(), "sandbox shut down");
    }

    /// The game loop.
    #[must_use]
    pub fn game_loop(&self) -> &GameLoop {
        &self.game_loop
    }

    /// The service registry.
    #[must_use]
    pub fn services(&self) -> &Rc<ServiceRegistry> {
        &self.services
    }

    /// The sandbox event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus<SandboxEvent, u32> {
        &self.events
    }

    /// Event totals so far.
    #[must_use]
    pub fn tally(&self) -> SandboxTally {
        *self.tally.borrow()
    }
}
