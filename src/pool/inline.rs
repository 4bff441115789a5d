//! A pool that runs work on the posting thread
//!
//! Useful as a deterministic stand-in wherever a [`Pool`] is expected, for
//! instance to observe the exact order in which a timer hands out work.

use crate::core::job::panic_message;
use crate::core::state::{Lifecycle, RunState, StopMode};
use crate::core::{Result, ThreadError, Work};
use crate::pool::worker::PoolStats;
use crate::pool::Pool;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

const COMPONENT: &str = "inline pool";

#[derive(Debug, Default)]
struct InlineState {
    lifecycle: Lifecycle,
    num_threads: usize,
}

/// Synchronous [`Pool`]: `post` executes the work before returning
///
/// Nothing is ever queued, so `cancel_all` has nothing to discard. The
/// thread count is recorded but no threads are created. A panicking work
/// item is caught and counted.
#[derive(Debug, Default)]
pub struct InlinePool {
    state: Mutex<InlineState>,
    stats: PoolStats,
}

impl InlinePool {
    /// Create a running inline pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread count last requested through `scale_threads`
    pub fn num_threads(&self) -> usize {
        self.state.lock().num_threads
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.state.lock().lifecycle.state()
    }

    /// Get pool statistics
    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }
}

impl Pool for InlinePool {
    fn scale_threads(&self, num_threads: usize) -> Result<()> {
        let mut state = self.state.lock();
        if !state.lifecycle.is_running() {
            return Err(ThreadError::stopped(COMPONENT));
        }
        state.num_threads = num_threads;
        Ok(())
    }

    fn post(&self, work: Work) -> Result<()> {
        if !self.state.lock().lifecycle.is_running() {
            self.stats.increment_rejected();
            return Err(ThreadError::stopped(COMPONENT));
        }
        self.stats.increment_posted();

        let start = Instant::now();
        let result = catch_unwind(AssertUnwindSafe(work));
        self.stats.add_busy_time(start.elapsed());

        match result {
            Ok(()) => self.stats.increment_completed(),
            Err(payload) => {
                log::error!("inline job panicked: {}", panic_message(payload.as_ref()));
                self.stats.increment_panicked();
            }
        }
        Ok(())
    }

    fn stop(&self, cancel_tasks: bool) -> Result<()> {
        let mut state = self.state.lock();
        state.lifecycle.begin_stop(StopMode::from_cancel(cancel_tasks));
        state.lifecycle.finish();
        state.num_threads = 0;
        Ok(())
    }

    fn cancel_all(&self) {}
}
