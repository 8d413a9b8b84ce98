//! # Service Trait
//!
//! Lifecycle hooks of a long-lived, registry-managed singleton.

use std::fmt;

use crate::schedule::Controlled;

/// How a service refreshes itself when it is accessed through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PollMode {
    /// Accesses never run [`Service::on_poll`].
    #[default]
    None,
    /// Every access runs [`Service::on_poll`].
    OnPoll,
    /// The first access of each frame runs [`Service::on_poll`].
    OnPollOncePerFrame,
}

/// When the registry constructs a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConstructionPolicy {
    /// Constructed when the registry is set up, in declared order.
    Eager,
    /// Constructed on the first [`get`](crate::ServiceRegistry::get).
    OnDemand,
    /// Constructed on the first `get`, with a warning. Flags dependencies
    /// that should have been made eager.
    #[default]
    OnDemandWithWarning,
}

impl ConstructionPolicy {
    /// Configuration name of the policy.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::OnDemand => "on_demand",
            Self::OnDemandWithWarning => "on_demand_with_warning",
        }
    }

    /// Returns true if `get` may construct the service.
    #[inline]
    #[must_use]
    pub const fn is_on_demand(self) -> bool {
        matches!(self, Self::OnDemand | Self::OnDemandWithWarning)
    }
}

impl fmt::Display for ConstructionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A long-lived object managed by a [`ServiceRegistry`](crate::ServiceRegistry).
///
/// Services take part in phase dispatch like any other registrant (through
/// [`Controlled`]); a service with no per-frame work returns an empty
/// [`PhaseSet`](crate::PhaseSet).
///
/// # Example
///
/// ```rust
/// use orrery_core::{Controlled, PhaseSet, PollMode, Service};
///
/// #[derive(Default)]
/// struct Weather { storms: u32 }
///
/// impl Controlled for Weather {
///     fn phases(&self) -> PhaseSet {
///         PhaseSet::empty()
///     }
/// }
///
/// impl Service for Weather {
///     fn poll_mode(&self) -> PollMode {
///         PollMode::OnPollOncePerFrame
///     }
///
///     fn on_poll(&mut self) {
///         self.storms += 1;
///     }
/// }
/// ```
pub trait Service: Controlled {
    /// One-time setup, run after construction and again after the entry is
    /// marked stale.
    fn initialise(&mut self) {}

    /// Whether phase callbacks start enabled after [`Service::initialise`].
    fn starts_active(&self) -> bool {
        true
    }

    /// Throttle rule for [`Service::on_poll`]. Read after each initialise.
    fn poll_mode(&self) -> PollMode {
        PollMode::None
    }

    /// Self-update driven by registry accesses.
    fn on_poll(&mut self) {}

    /// Runs when the registry drops the instance.
    fn teardown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_names() {
        assert_eq!(ConstructionPolicy::Eager.to_string(), "eager");
        assert_eq!(ConstructionPolicy::default(), ConstructionPolicy::OnDemandWithWarning);
        assert!(ConstructionPolicy::OnDemand.is_on_demand());
        assert!(!ConstructionPolicy::Eager.is_on_demand());
    }
}
