//! Simulated time
//!
//! The surrounding simulation owns the clock. Engines only read it, and
//! only through the [`Contact`](crate::Contact) handed to each hook.

use std::cell::Cell;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// A point in simulated time, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Display, From, Serialize, Deserialize)]
pub struct SimTime(pub f64);

impl SimTime {
    /// The start of the simulation
    pub const ZERO: SimTime = SimTime(0.0);

    /// "Never met", compares later than any real time
    pub const INFINITY: SimTime = SimTime(f64::INFINITY);

    /// Create a time from seconds
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Get the time in seconds
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier`
    pub fn since(&self, earlier: SimTime) -> f64 {
        self.0 - earlier.0
    }

    /// Shift this time by `secs`
    pub fn offset(&self, secs: f64) -> SimTime {
        SimTime(self.0 + secs)
    }

    /// Check if this is a finite point in time
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }
}

/// Source of simulated time
pub trait SimClock {
    /// Get the current simulated time
    fn now(&self) -> SimTime;
}

/// Clock advanced by hand
///
/// Used by the replay harness and by tests. Simulation is single-threaded,
/// so interior mutability through a `Cell` is enough.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<SimTime>,
}

impl ManualClock {
    /// Create a clock starting at `start`
    pub fn new(start: SimTime) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Jump to an absolute time
    ///
    /// Time never runs backwards; earlier values are ignored.
    pub fn set(&self, time: SimTime) {
        if time > self.now.get() {
            self.now.set(time);
        }
    }

    /// Move the clock forward by `secs`
    pub fn advance(&self, secs: f64) {
        self.set(self.now.get().offset(secs));
    }
}

impl SimClock for ManualClock {
    fn now(&self) -> SimTime {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_time_arithmetic() {
        let start = SimTime::from_secs(10.0);
        let end = SimTime::from_secs(40.0);
        assert_eq!(end.since(start), 30.0);
        assert_eq!(start.offset(5.0), SimTime(15.0));
        assert!(SimTime::INFINITY > end);
        assert!(!SimTime::INFINITY.is_finite());
    }

    #[test]
    fn test_manual_clock_monotonic() {
        let clock = ManualClock::new(SimTime::ZERO);
        clock.advance(12.5);
        assert_eq!(clock.now(), SimTime(12.5));

        clock.set(SimTime(3.0));
        assert_eq!(clock.now(), SimTime(12.5));

        clock.set(SimTime(20.0));
        assert_eq!(clock.now(), SimTime(20.0));
    }
}
