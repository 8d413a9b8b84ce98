//! # ORRERY Game Loop
//!
//! Drives the frame-level dispatcher once per logical frame:
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. UPDATE                                                           │
//! │    └─ ServiceRegistry relay (services in their declared order),     │
//! │       then the remaining declared types, then undeclared ones       │
//! │                                                                     │
//! │ 2. LATE UPDATE                                                      │
//! │    └─ Same order, after every regular update of the frame           │
//! │                                                                     │
//! │ 3. FIXED UPDATE                                                     │
//! │    └─ delta_time is the configured fixed timestep                   │
//! │                                                                     │
//! │ 4. DEBUG UPDATE (debug builds by default)                           │
//! │                                                                     │
//! │ 5. END FRAME                                                        │
//! │    └─ Advance the shared frame stamp, record timings                │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::rc::Rc;
use std::time::{Duration, Instant};

use orrery_core::{
    ControlledHandle, FrameClock, FrameStamp, Phase, PhaseDispatcher, ServiceRegistry, TypeKey,
};

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Maximum allowed frame time before warning.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Configuration for the game loop.
#[derive(Clone, Debug)]
pub struct GameLoopConfig {
    /// Owner label of the frame dispatcher, used in diagnostics.
    pub label: String,
    /// Delta time handed to FixedUpdate, in seconds.
    pub fixed_timestep: f32,
    /// Upper bound for measured deltas in `tick_realtime`, in seconds.
    pub max_delta: f32,
    /// Run the DebugUpdate phase.
    pub debug_updates: bool,
    /// Enable frame timing logs.
    pub enable_timing_logs: bool,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            label: "frame".to_owned(),
            fixed_timestep: 0.02,
            // Clamp delta time to prevent physics explosion after pause
            max_delta: 0.1,
            debug_updates: cfg!(debug_assertions),
            enable_timing_logs: false,
        }
    }
}

/// Frame timing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Stamp of the frame these statistics describe.
    pub frame: FrameStamp,
    /// Delta time handed to Update, LateUpdate and DebugUpdate.
    pub delta_time: f32,
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// Update phase time in microseconds.
    pub update_us: u64,
    /// LateUpdate phase time in microseconds.
    pub late_update_us: u64,
    /// FixedUpdate phase time in microseconds.
    pub fixed_update_us: u64,
    /// DebugUpdate phase time in microseconds (0 when skipped).
    pub debug_update_us: u64,
    /// Callbacks invoked by the frame dispatcher this frame.
    pub callbacks: usize,
}

/// The main game loop orchestrator.
///
/// Owns the frame clock and the frame-level dispatcher. A service registry
/// attached with [`GameLoop::attach_services`] runs at its relay's position in
/// the declared order and is visible to every callback through
/// [`PhaseContext::services`](orrery_core::PhaseContext::services).
pub struct GameLoop {
    /// The frame-level dispatcher.
    dispatcher: PhaseDispatcher,
    /// Shared frame stamp.
    clock: FrameClock,
    /// Attached service registry.
    services: Option<Rc<ServiceRegistry>>,
    /// Relay registered for the attached registry.
    relay: Option<ControlledHandle>,
    /// Configuration.
    config: GameLoopConfig,
    /// Last frame start time.
    last_frame_time: Instant,
    /// Accumulated frame statistics.
    stats_accumulator: FrameStatsAccumulator,
}

impl GameLoop {
    /// Creates a new game loop.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration for the game loop
    /// * `declared_order` - Declared type order of the frame dispatcher
    #[must_use]
    pub fn new(config: GameLoopConfig, declared_order: impl IntoIterator<Item = TypeKey>) -> Self {
        let clock = FrameClock::new();
        let dispatcher = PhaseDispatcher::with_clock(config.label.clone(), declared_order, clock.clone());

        Self {
            dispatcher,
            clock,
            services: None,
            relay: None,
            config,
            last_frame_time: Instant::now(),
            stats_accumulator: FrameStatsAccumulator::new(),
        }
    }

    /// Attaches a service registry, replacing any previous one.
    ///
    /// The registry should share this loop's clock (build it with
    /// `ServiceRegistry::with_clock(descriptors, game_loop.clock().clone())`)
    /// so its poll throttles follow the frame stamp.
    pub fn attach_services(&mut self, registry: Rc<ServiceRegistry>) {
        if !registry.dispatcher().clock().shares_counter_with(&self.clock) {
            tracing::warn!("attached service registry does not share the frame clock");
        }
        self.detach_services();

        let relay = registry.relay();
        self.dispatcher.register(&relay);
        self.relay = Some(relay);
        self.services = Some(registry);
    }

    /// Detaches the service registry, if any.
    pub fn detach_services(&mut self) -> Option<Rc<ServiceRegistry>> {
        if let Some(relay) = self.relay.take() {
            self.dispatcher.unregister(&relay);
        }
        self.services.take()
    }

    /// Runs one frame with an explicit delta time.
    ///
    /// # Returns
    ///
    /// Timings of the frame, also recorded in [`GameLoop::stats`].
    pub fn tick(&mut self, delta_time: f32) -> FrameStats {
        let frame_start = Instant::now();
        let mut stats = FrameStats {
            frame: self.clock.now(),
            delta_time,
            ..FrameStats::default()
        };

        stats.update_us = self.timed_phase(Phase::Update, delta_time, &mut stats.callbacks);
        stats.late_update_us = self.timed_phase(Phase::LateUpdate, delta_time, &mut stats.callbacks);
        stats.fixed_update_us =
            self.timed_phase(Phase::FixedUpdate, self.config.fixed_timestep, &mut stats.callbacks);
        if self.config.debug_updates {
            stats.debug_update_us = self.timed_phase(Phase::DebugUpdate, delta_time, &mut stats.callbacks);
        }

        stats.total_us = micros(frame_start.elapsed());
        self.end_frame(stats);
        stats
    }

    /// Runs one frame using the wall-clock time since the previous call,
    /// clamped to `max_delta`.
    pub fn tick_realtime(&mut self) -> FrameStats {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time);
        self.last_frame_time = now;

        self.tick(delta.as_secs_f32().min(self.config.max_delta))
    }

    fn timed_phase(&self, phase: Phase, delta_time: f32, callbacks: &mut usize) -> u64 {
        let start = Instant::now();
        *callbacks += self
            .dispatcher
            .run_phase_with(phase, delta_time, self.services.as_deref());
        micros(start.elapsed())
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.clock.advance();
        self.stats_accumulator.record(stats);

        // Log slow frames
        if self.config.enable_timing_logs && stats.total_us > micros(MAX_FRAME_TIME) {
            tracing::warn!(
                frame = stats.frame,
                total_ms = stats.total_us as f64 / 1000.0,
                target_ms = TARGET_FRAME_TIME.as_secs_f64() * 1000.0,
                "frame exceeded budget"
            );
        }
    }

    /// Returns the current frame stamp.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> FrameStamp {
        self.clock.now()
    }

    /// The frame-level dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &PhaseDispatcher {
        &self.dispatcher
    }

    /// The shared frame clock.
    #[must_use]
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// The attached service registry.
    #[must_use]
    pub fn services(&self) -> Option<&Rc<ServiceRegistry>> {
        self.services.as_ref()
    }

    /// The loop configuration.
    #[must_use]
    pub fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Sum of Update times.
    pub update_us_sum: u64,
    /// Sum of LateUpdate times.
    pub late_update_us_sum: u64,
    /// Sum of FixedUpdate times.
    pub fixed_update_us_sum: u64,
    /// Sum of DebugUpdate times.
    pub debug_update_us_sum: u64,
    /// Sum of callbacks invoked.
    pub callbacks_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            update_us_sum: 0,
            late_update_us_sum: 0,
            fixed_update_us_sum: 0,
            debug_update_us_sum: 0,
            callbacks_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.update_us_sum += stats.update_us;
        self.late_update_us_sum += stats.late_update_us;
        self.fixed_update_us_sum += stats.fixed_update_us;
        self.debug_update_us_sum += stats.debug_update_us;
        self.callbacks_sum += stats.callbacks as u64;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);

        if stats.total_us > micros(TARGET_FRAME_TIME) {
            self.frames_over_budget += 1;
        }
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        self.average_ms(self.total_us_sum)
    }

    /// Returns average FPS.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Returns average callbacks per frame.
    #[must_use]
    pub fn avg_callbacks(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.callbacks_sum as f64 / self.frames_recorded as f64
    }

    /// Returns the percentage of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    fn average_ms(&self, sum_us: u64) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (sum_us as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Prints a summary of the statistics.
    pub fn print_summary(&self) {
        println!("╔══════════════════════════════════════════════════════════════════╗");
        println!("║                    FRAME STATISTICS SUMMARY                      ║");
        println!("╚══════════════════════════════════════════════════════════════════╝");
        println!();
        println!("┌─ TIMING ───────────────────────────────────────────────────────┐");
        println!("│ Frames Recorded:    {}", self.frames_recorded);
        println!("│ Average Frame:      {:.3} ms ({:.1} FPS)", self.avg_frame_ms(), self.avg_fps());
        if self.frames_recorded > 0 {
            println!("│ Min Frame:          {:.3} ms", self.min_frame_us as f64 / 1000.0);
            println!("│ Max Frame:          {:.3} ms", self.max_frame_us as f64 / 1000.0);
        }
        println!("│ Callbacks / Frame:  {:.1}", self.avg_callbacks());
        println!("└──────────────────────────────────────────────────────────────────┘");

        if self.frames_recorded > 0 {
            println!();
            println!("┌─ BREAKDOWN ─────────────────────────────────────────────────────┐");
            println!("│ Update:             {:.3} ms", self.average_ms(self.update_us_sum));
            println!("│ LateUpdate:         {:.3} ms", self.average_ms(self.late_update_us_sum));
            println!("│ FixedUpdate:        {:.3} ms", self.average_ms(self.fixed_update_us_sum));
            println!("│ DebugUpdate:        {:.3} ms", self.average_ms(self.debug_update_us_sum));
            println!("│ Over Budget:        {} frames ({:.1}%)",
                self.frames_over_budget,
                self.over_budget_ratio() * 100.0);
            println!("└──────────────────────────────────────────────────────────────────┘");
        }
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use orrery_core::{Controlled, PhaseContext, PhaseSet};

    struct PhaseLog(Rc<RefCell<Vec<(Phase, f32)>>>);

    impl Controlled for PhaseLog {
        fn phases(&self) -> PhaseSet {
            PhaseSet::all()
        }

        fn update(&mut self, ctx: &PhaseContext<'_>) {
            self.0.borrow_mut().push((ctx.phase(), ctx.delta_time()));
        }

        fn late_update(&mut self, ctx: &PhaseContext<'_>) {
            self.0.borrow_mut().push((ctx.phase(), ctx.delta_time()));
        }

        fn fixed_update(&mut self, ctx: &PhaseContext<'_>) {
            self.0.borrow_mut().push((ctx.phase(), ctx.delta_time()));
        }

        fn debug_update(&mut self, ctx: &PhaseContext<'_>) {
            self.0.borrow_mut().push((ctx.phase(), ctx.delta_time()));
        }
    }

    #[test]
    fn test_game_loop_creation() {
        let game_loop = GameLoop::new(GameLoopConfig::default(), []);
        assert_eq!(game_loop.frame_count(), 0);
        assert!(game_loop.services().is_none());
    }

    #[test]
    fn test_tick_runs_phases_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let config = GameLoopConfig {
            fixed_timestep: 0.5,
            debug_updates: true,
            ..GameLoopConfig::default()
        };
        let mut game_loop = GameLoop::new(config, []);
        game_loop
            .dispatcher()
            .register(&ControlledHandle::new(PhaseLog(Rc::clone(&log))));

        let stats = game_loop.tick(0.25);
        assert_eq!(stats.frame, 0);
        assert_eq!(stats.callbacks, 4);
        assert_eq!(game_loop.frame_count(), 1);
        assert_eq!(
            *log.borrow(),
            vec![
                (Phase::Update, 0.25),
                (Phase::LateUpdate, 0.25),
                (Phase::FixedUpdate, 0.5),
                (Phase::DebugUpdate, 0.25),
            ]
        );
    }

    #[test]
    fn test_debug_phase_can_be_disabled() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let config = GameLoopConfig {
            debug_updates: false,
            ..GameLoopConfig::default()
        };
        let mut game_loop = GameLoop::new(config, []);
        game_loop
            .dispatcher()
            .register(&ControlledHandle::new(PhaseLog(Rc::clone(&log))));

        assert_eq!(game_loop.tick(0.1).callbacks, 3);
        assert!(log.borrow().iter().all(|(phase, _)| *phase != Phase::DebugUpdate));
    }

    #[test]
    fn test_realtime_delta_is_clamped() {
        let config = GameLoopConfig {
            max_delta: 0.0,
            ..GameLoopConfig::default()
        };
        let mut game_loop = GameLoop::new(config, []);
        assert!(game_loop.tick_realtime().delta_time <= 0.0);
        assert_eq!(game_loop.stats().frames_recorded, 1);
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new();

        for i in 0..100 {
            acc.record(FrameStats {
                frame: i,
                total_us: 10_000 + (i * 100),
                update_us: 5000,
                callbacks: 10,
                ..FrameStats::default()
            });
        }

        assert_eq!(acc.frames_recorded, 100);
        assert!(acc.avg_fps() > 50.0);
        assert!(acc.avg_fps() < 100.0);
        assert!((acc.avg_callbacks() - 10.0).abs() < f64::EPSILON);
    }
}
