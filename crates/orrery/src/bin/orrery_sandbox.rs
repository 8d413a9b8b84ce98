//! # ORRERY Sandbox
//!
//! Runs the sandbox headless for a number of frames and prints what happened.
//!
//! ```bash
//! # Default manifest, 120 frames
//! ./orrery_sandbox
//!
//! # Custom manifest and frame count, verbose
//! RUST_LOG=orrery=debug,orrery_core=debug ./orrery_sandbox sandbox.toml 600
//! ```

use std::process::ExitCode;

use orrery::config::Manifest;
use orrery::{GameLoopConfig, Sandbox};
use tracing_subscriber::EnvFilter;

const DEFAULT_FRAMES: u64 = 120;
const FRAME_DELTA: f32 = 1.0 / 60.0;

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn main() -> ExitCode {
    setup_tracing();

    let mut args = std::env::args().skip(1);
    let manifest_path = args.next();
    let frames = match args.next().map(|raw| raw.parse::<u64>()) {
        None => DEFAULT_FRAMES,
        Some(Ok(frames)) => frames,
        Some(Err(error)) => {
            eprintln!("   ✗ invalid frame count: {error}");
            return ExitCode::FAILURE;
        }
    };

    let config = GameLoopConfig {
        enable_timing_logs: true,
        ..GameLoopConfig::default()
    };
    let built = match manifest_path {
        Some(path) => Manifest::load(&path).and_then(|manifest| Sandbox::from_manifest(&manifest, config)),
        None => Sandbox::with_default_manifest(config),
    };
    let mut sandbox = match built {
        Ok(sandbox) => sandbox,
        Err(error) => {
            eprintln!("   ✗ FATAL: {error}");
            return ExitCode::FAILURE;
        }
    };

    println!("═══════════════════════════════════════════════════════════════════");
    println!("                       ORRERY SANDBOX");
    println!("═══════════════════════════════════════════════════════════════════");
    println!();
    println!("{}", sandbox.services().describe());
    println!();

    sandbox.run(frames, FRAME_DELTA);

    sandbox.game_loop().stats().print_summary();
    println!();
    println!("  Events:   {}", sandbox.tally());
    println!();

    sandbox.shutdown();
    ExitCode::SUCCESS
}
