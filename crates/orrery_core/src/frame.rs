//! # Frame Stamps
//!
//! A shared, monotonically increasing frame counter.
//!
//! The frame driver advances the clock once per logical frame. Everything that
//! needs "has this already happened this frame?" compares stamps for equality
//! instead of comparing floating-point times.

use std::cell::Cell;
use std::rc::Rc;

/// Identity of a logical frame.
pub type FrameStamp = u64;

/// Shared handle to the current frame stamp.
///
/// Cloning the clock shares the counter: the frame driver, the dispatchers and
/// the service registry all observe the same stamp.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    current: Rc<Cell<FrameStamp>>,
}

impl FrameClock {
    /// Creates a clock starting at frame 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current frame stamp.
    #[inline]
    #[must_use]
    pub fn now(&self) -> FrameStamp {
        self.current.get()
    }

    /// Advances to the next frame and returns the new stamp.
    pub fn advance(&self) -> FrameStamp {
        let next = self.current.get().wrapping_add(1);
        self.current.set(next);
        next
    }

    /// Returns true if both handles share the same counter.
    #[must_use]
    pub fn shares_counter_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.current, &other.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = FrameClock::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.now(), 1);
    }

    #[test]
    fn test_clones_share_counter() {
        let clock = FrameClock::new();
        let view = clock.clone();
        clock.advance();
        clock.advance();
        assert_eq!(view.now(), 2);
        assert!(view.shares_counter_with(&clock));
        assert!(!view.shares_counter_with(&FrameClock::new()));
    }
}
