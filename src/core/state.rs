//! Lifecycle shared by the pool and the timer
//!
//! Both components move one way through `Running → Stopping → Stopped`.
//! `Stopping` is entered by the first stop request; the mode chosen then
//! decides whether queued work is drained or discarded.

use std::fmt;

/// Observable lifecycle state of a pool or timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunState {
    /// Accepting and dispatching work
    Running,
    /// A stop was requested; threads are winding down
    Stopping,
    /// Every owned thread has been joined
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Stopping => write!(f, "stopping"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// What happens to queued work when a stop is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Keep dispatching until the queue is empty
    Drain,
    /// Discard everything still queued
    Cancel,
}

impl StopMode {
    /// Map the `cancel_tasks` flag of a stop call to a mode
    pub fn from_cancel(cancel_tasks: bool) -> Self {
        if cancel_tasks {
            StopMode::Cancel
        } else {
            StopMode::Drain
        }
    }
}

/// Lifecycle bookkeeping, kept inside the component's locked state
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    stop: Option<StopMode>,
    stopped: bool,
}

impl Lifecycle {
    pub(crate) fn state(&self) -> RunState {
        match (self.stop, self.stopped) {
            (_, true) => RunState::Stopped,
            (Some(_), false) => RunState::Stopping,
            (None, false) => RunState::Running,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.stop.is_none()
    }

    pub(crate) fn mode(&self) -> Option<StopMode> {
        self.stop
    }

    /// Record a stop request; returns `true` for the first one only
    pub(crate) fn begin_stop(&mut self, mode: StopMode) -> bool {
        if self.stop.is_some() {
            return false;
        }
        self.stop = Some(mode);
        true
    }

    pub(crate) fn finish(&mut self) {
        self.stopped = true;
    }
}
