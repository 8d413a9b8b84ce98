//! # Frame Phases
//!
//! The fixed set of per-frame dispatch passes and a compact set type used by
//! registrants to declare which passes they take part in.

use std::fmt;

/// One per-frame dispatch pass.
///
/// The frame driver invokes them in declaration order:
/// `Update`, `LateUpdate`, `FixedUpdate`, then `DebugUpdate` in debug builds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Phase {
    /// Regular per-frame update.
    Update = 0,
    /// Runs after every `Update` callback of the frame.
    LateUpdate = 1,
    /// Fixed-rate update, called with the fixed timestep.
    FixedUpdate = 2,
    /// Diagnostic-only update, driven in non-release builds.
    DebugUpdate = 3,
}

impl Phase {
    /// Number of phases.
    pub const COUNT: usize = 4;

    /// All phases in frame order.
    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::Update,
        Phase::LateUpdate,
        Phase::FixedUpdate,
        Phase::DebugUpdate,
    ];

    /// Dense index of the phase (0..COUNT).
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true for phases that only run in non-release builds.
    #[inline]
    #[must_use]
    pub const fn is_debug_only(self) -> bool {
        matches!(self, Phase::DebugUpdate)
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Phase::Update => "update",
            Phase::LateUpdate => "late_update",
            Phase::FixedUpdate => "fixed_update",
            Phase::DebugUpdate => "debug_update",
        }
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of phases, stored as a bitmask.
///
/// ```rust
/// use orrery_core::{Phase, PhaseSet};
///
/// let phases = PhaseSet::empty().with(Phase::Update).with(Phase::FixedUpdate);
/// assert!(phases.contains(Phase::FixedUpdate));
/// assert!(!phases.contains(Phase::LateUpdate));
/// ```
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PhaseSet(u8);

impl PhaseSet {
    /// The empty set.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every phase.
    #[inline]
    #[must_use]
    pub const fn all() -> Self {
        Self(0b1111)
    }

    /// A set holding a single phase.
    #[inline]
    #[must_use]
    pub const fn only(phase: Phase) -> Self {
        Self(phase.bit())
    }

    /// Returns a copy of the set with `phase` added.
    #[inline]
    #[must_use]
    pub const fn with(self, phase: Phase) -> Self {
        Self(self.0 | phase.bit())
    }

    /// Returns a copy of the set with `phase` removed.
    #[inline]
    #[must_use]
    pub const fn without(self, phase: Phase) -> Self {
        Self(self.0 & !phase.bit())
    }

    /// Returns true if `phase` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, phase: Phase) -> bool {
        self.0 & phase.bit() != 0
    }

    /// Returns true if no phase is in the set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of phases in the set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates over the phases in frame order.
    pub fn iter(self) -> impl Iterator<Item = Phase> {
        Phase::ALL.into_iter().filter(move |phase| self.contains(*phase))
    }
}

impl FromIterator<Phase> for PhaseSet {
    fn from_iter<I: IntoIterator<Item = Phase>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for PhaseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_indices_are_dense() {
        for (expected, phase) in Phase::ALL.into_iter().enumerate() {
            assert_eq!(phase.index(), expected);
        }
    }

    #[test]
    fn test_phase_set_ops() {
        let set = PhaseSet::only(Phase::Update).with(Phase::DebugUpdate);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Phase::DebugUpdate));
        assert!(!set.without(Phase::DebugUpdate).contains(Phase::DebugUpdate));
        assert!(PhaseSet::empty().is_empty());
        assert_eq!(PhaseSet::all().len(), Phase::COUNT);
    }

    #[test]
    fn test_phase_set_iterates_in_frame_order() {
        let set: PhaseSet = [Phase::FixedUpdate, Phase::Update].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Phase::Update, Phase::FixedUpdate]);
    }
}
