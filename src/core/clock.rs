//! Clock sources and timepoint resolution for the timer
//!
//! A [`Clock`] reports the time elapsed since its own epoch as a
//! [`Duration`]. Timepoints handled by the timer are values of that same
//! type, truncated to the configured [`Resolution`].

use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of "now" for deadline arithmetic
pub trait Clock: Send + Sync + fmt::Debug {
    /// Time elapsed since this clock's epoch
    fn now(&self) -> Duration;

    /// Short name for logging
    fn name(&self) -> &str {
        "clock"
    }
}

/// Wall-clock time measured from the UNIX epoch
///
/// Subject to system clock adjustments. A clock set before the epoch reads
/// as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }

    fn name(&self) -> &str {
        "system"
    }
}

/// Monotonic time measured from the moment the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose epoch is now
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn name(&self) -> &str {
        "monotonic"
    }
}

/// Granularity of timepoints and timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    /// 1ns ticks
    #[default]
    Nanoseconds,
    /// 1µs ticks
    Microseconds,
    /// 1ms ticks
    Milliseconds,
    /// 1s ticks
    Seconds,
}

impl Resolution {
    /// Length of one tick
    pub fn tick(&self) -> Duration {
        match self {
            Resolution::Nanoseconds => Duration::from_nanos(1),
            Resolution::Microseconds => Duration::from_micros(1),
            Resolution::Milliseconds => Duration::from_millis(1),
            Resolution::Seconds => Duration::from_secs(1),
        }
    }

    /// Round `value` down to a whole number of ticks
    pub fn truncate(&self, value: Duration) -> Duration {
        let tick = self.tick().as_nanos();
        let total = value.as_nanos() / tick * tick;
        let secs = (total / 1_000_000_000) as u64;
        let nanos = (total % 1_000_000_000) as u32;
        Duration::new(secs, nanos)
    }
}
