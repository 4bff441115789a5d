//! Deadline-ordered timer layered over a pool

mod deadline;
pub mod deadline_timer;

pub use deadline_timer::{Timer, TimerConfig};

use crate::core::{Result, Work};
use std::time::Duration;

/// Operations every timer offers
pub trait Scheduler: Send + Sync {
    /// Post `work` to the underlying pool once `timeout` has elapsed.
    fn expires_from_now(&self, timeout: Duration, work: Work) -> Result<()>;

    /// Stop the timer and then its pool, blocking until all threads are joined.
    ///
    /// With `cancel_tasks` pending deadlines are discarded, otherwise each
    /// one is waited for and posted first.
    fn stop(&self, cancel_tasks: bool) -> Result<()>;

    /// Discard every pending deadline.
    fn cancel_all(&self);
}
