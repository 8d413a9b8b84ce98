//! # ORRERY
//!
//! The frame driver and a sandbox integrating the runtime core.
//!
//! ## Frame Order
//!
//! ```text
//! tick(dt):
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. Update        (dt)            declared order, then others │
//! │ 2. LateUpdate    (dt)                                        │
//! │ 3. FixedUpdate   (fixed_timestep)                            │
//! │ 4. DebugUpdate   (dt)            only when enabled           │
//! │ 5. advance frame stamp                                       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `game_loop`: Frame orchestration and timing
//! - `sandbox`: Demonstration services, satellites and the manifest they load from

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod game_loop;
pub mod sandbox;

// Re-export the building blocks
pub use orrery_config as config;
pub use orrery_core as core;

// Re-export commonly used types
pub use game_loop::{FrameStats, FrameStatsAccumulator, GameLoop, GameLoopConfig};
pub use sandbox::{Sandbox, SandboxEvent, SandboxTally, DEFAULT_MANIFEST};
