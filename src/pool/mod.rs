//! Thread pool and worker implementations
//!
//! [`Pool`] is the capability set the rest of the crate depends on. The
//! [`Timer`](crate::timer::Timer) only ever sees its pool through this trait,
//! so [`ThreadPool`], [`InlinePool`] or any other implementation can be
//! substituted.

pub mod inline;
pub mod thread_pool;
pub mod worker;

pub use inline::InlinePool;
pub use thread_pool::{ThreadPool, ThreadPoolConfig};
pub use worker::{PoolStats, PoolStatsSnapshot};

use crate::core::{Result, Work};
use std::sync::Arc;

/// Operations every pool offers
pub trait Pool: Send + Sync {
    /// Resize the pool to exactly `num_threads` workers, blocking until done.
    ///
    /// Must be called from outside the pool's own threads.
    fn scale_threads(&self, num_threads: usize) -> Result<()>;

    /// Queue `work` for execution and wake one idle worker.
    ///
    /// Fails with [`ThreadError::Stopped`](crate::ThreadError::Stopped) once a
    /// stop has been requested; the rejected work is dropped without running.
    fn post(&self, work: Work) -> Result<()>;

    /// Stop the pool, blocking until every worker has been joined.
    ///
    /// With `cancel_tasks` queued work is discarded, otherwise it is drained
    /// first. Stopping is terminal.
    fn stop(&self, cancel_tasks: bool) -> Result<()>;

    /// Discard all queued work without stopping the pool.
    fn cancel_all(&self);
}

impl<P: Pool + ?Sized> Pool for Arc<P> {
    fn scale_threads(&self, num_threads: usize) -> Result<()> {
        (**self).scale_threads(num_threads)
    }

    fn post(&self, work: Work) -> Result<()> {
        (**self).post(work)
    }

    fn stop(&self, cancel_tasks: bool) -> Result<()> {
        (**self).stop(cancel_tasks)
    }

    fn cancel_all(&self) {
        (**self).cancel_all()
    }
}

impl<P: Pool + ?Sized> Pool for Box<P> {
    fn scale_threads(&self, num_threads: usize) -> Result<()> {
        (**self).scale_threads(num_threads)
    }

    fn post(&self, work: Work) -> Result<()> {
        (**self).post(work)
    }

    fn stop(&self, cancel_tasks: bool) -> Result<()> {
        (**self).stop(cancel_tasks)
    }

    fn cancel_all(&self) {
        (**self).cancel_all()
    }
}
