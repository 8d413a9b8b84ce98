//! # Phase Context
//!
//! Everything a callback can see while a phase is being dispatched.

use crate::frame::FrameStamp;
use crate::services::ServiceRegistry;

use super::controlled::ControlledHandle;
use super::dispatcher::PhaseDispatcher;
use super::phase::Phase;

/// Per-callback view of the running dispatch.
///
/// Callbacks reach the dispatcher through the context to spawn (register) or
/// destroy (unregister) registrants, including themselves, mid-dispatch.
pub struct PhaseContext<'a> {
    pub(crate) dispatcher: &'a PhaseDispatcher,
    pub(crate) current: &'a ControlledHandle,
    pub(crate) services: Option<&'a ServiceRegistry>,
    pub(crate) phase: Phase,
    pub(crate) delta_time: f32,
    pub(crate) frame: FrameStamp,
}

impl<'a> PhaseContext<'a> {
    /// The dispatcher running this phase.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &'a PhaseDispatcher {
        self.dispatcher
    }

    /// Handle of the registrant being invoked.
    #[inline]
    #[must_use]
    pub fn current(&self) -> &'a ControlledHandle {
        self.current
    }

    /// The service registry, when the dispatch was started with one.
    #[inline]
    #[must_use]
    pub fn services(&self) -> Option<&'a ServiceRegistry> {
        self.services
    }

    /// The phase being dispatched.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Seconds since the last call of this phase (the fixed timestep for
    /// [`Phase::FixedUpdate`]).
    #[inline]
    #[must_use]
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Stamp of the frame being dispatched.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> FrameStamp {
        self.frame
    }

    /// Registers another registrant with the running dispatcher.
    pub fn register(&self, handle: &ControlledHandle) -> bool {
        self.dispatcher.register(handle)
    }

    /// Unregisters a registrant from the running dispatcher.
    pub fn unregister(&self, handle: &ControlledHandle) -> bool {
        self.dispatcher.unregister(handle)
    }

    /// Unregisters the registrant being invoked from every phase.
    ///
    /// The current callback finishes normally; no other registrant of this
    /// dispatch is skipped or invoked twice.
    pub fn unregister_self(&self) -> bool {
        self.dispatcher.unregister(self.current)
    }
}
