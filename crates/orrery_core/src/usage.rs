//! Diagnostic routing for usage and configuration errors.
//!
//! Usage errors are only reported in debug builds. Release builds ignore them
//! and the calling operation degrades to a no-op.

use crate::error::CoreError;

/// Reports a usage error (double registration, nested enumeration, ...).
///
/// Logged at `warn` in debug builds, silent in release builds.
pub fn report(error: &CoreError) {
    if cfg!(debug_assertions) {
        tracing::warn!(%error, "usage error");
    }
}

/// Reports a configuration error that was normalised instead of rejected.
///
/// Configuration problems are logged in every build: they are detected once at
/// setup, never per frame.
pub fn report_config(error: &CoreError) {
    tracing::warn!(%error, "configuration normalised");
}
