//! Worker dispatch loop and pool statistics

use crate::core::job::panic_message;
use crate::core::state::{Lifecycle, StopMode};
use crate::core::Work;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

thread_local! {
    static CURRENT_POOL: Cell<Option<usize>> = const { Cell::new(None) };
}

/// ID of the pool whose worker is running on this thread, if any
pub(crate) fn current_pool() -> Option<usize> {
    CURRENT_POOL.with(Cell::get)
}

/// Statistics for a thread pool
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Work items accepted by `post`
    pub jobs_posted: AtomicU64,
    /// Work items that ran to completion
    pub jobs_completed: AtomicU64,
    /// Work items that panicked
    pub jobs_panicked: AtomicU64,
    /// Accepted work items dropped without running
    pub jobs_discarded: AtomicU64,
    /// Work items refused by `post` because the pool was stopping
    pub jobs_rejected: AtomicU64,
    /// Total time spent executing work (microseconds)
    pub total_busy_time_us: AtomicU64,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_posted(&self) {
        self.jobs_posted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_panicked(&self) {
        self.jobs_panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_discarded(&self, count: usize) {
        self.jobs_discarded
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn increment_rejected(&self) {
        self.jobs_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_busy_time(&self, elapsed: Duration) {
        self.total_busy_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Get total jobs posted
    pub fn get_jobs_posted(&self) -> u64 {
        self.jobs_posted.load(Ordering::Relaxed)
    }

    /// Get total jobs completed
    pub fn get_jobs_completed(&self) -> u64 {
        self.jobs_completed.load(Ordering::Relaxed)
    }

    /// Get total jobs panicked
    pub fn get_jobs_panicked(&self) -> u64 {
        self.jobs_panicked.load(Ordering::Relaxed)
    }

    /// Get total jobs discarded
    pub fn get_jobs_discarded(&self) -> u64 {
        self.jobs_discarded.load(Ordering::Relaxed)
    }

    /// Get total posts refused after a stop
    pub fn get_jobs_rejected(&self) -> u64 {
        self.jobs_rejected.load(Ordering::Relaxed)
    }

    /// Get average execution time per finished job in microseconds
    pub fn get_average_busy_time_us(&self) -> f64 {
        let total = self.total_busy_time_us.load(Ordering::Relaxed);
        let count = self.get_jobs_completed() + self.get_jobs_panicked();
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Copy the counters into a plain value
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            jobs_posted: self.get_jobs_posted(),
            jobs_completed: self.get_jobs_completed(),
            jobs_panicked: self.get_jobs_panicked(),
            jobs_discarded: self.get_jobs_discarded(),
            jobs_rejected: self.get_jobs_rejected(),
            total_busy_time_us: self.total_busy_time_us.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolStatsSnapshot {
    /// Work items accepted by `post`
    pub jobs_posted: u64,
    /// Work items that ran to completion
    pub jobs_completed: u64,
    /// Work items that panicked
    pub jobs_panicked: u64,
    /// Accepted work items dropped without running
    pub jobs_discarded: u64,
    /// Work items refused after a stop
    pub jobs_rejected: u64,
    /// Total execution time in microseconds
    pub total_busy_time_us: u64,
}

impl PoolStatsSnapshot {
    /// Accepted items not yet finished or discarded
    pub fn pending(&self) -> u64 {
        self.jobs_posted
            .saturating_sub(self.jobs_completed + self.jobs_panicked + self.jobs_discarded)
    }
}

/// State guarded by the job lock
#[derive(Default)]
pub(crate) struct Queue {
    pub(crate) jobs: VecDeque<Work>,
    pub(crate) lifecycle: Lifecycle,
    /// Workers that should leave their loop to satisfy a scale-down
    pub(crate) retire: usize,
    /// IDs of workers that left their loop and await joining
    pub(crate) exited: Vec<usize>,
}

/// State shared between a pool and its workers
pub(crate) struct Shared {
    pub(crate) pool_id: usize,
    pub(crate) queue: Mutex<Queue>,
    /// Workers spawned and not yet exited
    pub(crate) live: AtomicUsize,
    /// Wakes workers: new work, retire requests, stop
    pub(crate) jobs_await: Condvar,
    /// Wakes a scaler waiting for workers to leave
    pub(crate) exited_await: Condvar,
    pub(crate) stats: PoolStats,
}

impl Shared {
    pub(crate) fn new(pool_id: usize) -> Self {
        Self {
            pool_id,
            queue: Mutex::new(Queue::default()),
            live: AtomicUsize::new(0),
            jobs_await: Condvar::new(),
            exited_await: Condvar::new(),
            stats: PoolStats::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Retired,
    Stopped,
    Faulted,
}

/// Main worker loop
///
/// Takes work from the front of the queue until asked to retire, the pool
/// stops, or a work item panics. The job lock is never held while work runs.
pub(crate) fn run(id: usize, shared: Arc<Shared>) {
    CURRENT_POOL.with(|pool| pool.set(Some(shared.pool_id)));

    #[cfg(feature = "tracing")]
    let _span = ::tracing::debug_span!("worker", pool = shared.pool_id, id = id).entered();

    log::debug!("pool {} worker {} started", shared.pool_id, id);

    let mut queue = shared.queue.lock();
    let exit = loop {
        if queue.retire > 0 {
            queue.retire -= 1;
            break Exit::Retired;
        }

        match queue.lifecycle.mode() {
            Some(StopMode::Cancel) => break Exit::Stopped,
            Some(StopMode::Drain) if queue.jobs.is_empty() => break Exit::Stopped,
            _ => {}
        }

        let Some(work) = queue.jobs.pop_front() else {
            shared.jobs_await.wait(&mut queue);
            continue;
        };

        let outcome = MutexGuard::unlocked(&mut queue, || execute(id, work, &shared.stats));
        if outcome.is_err() {
            break Exit::Faulted;
        }
    };

    shared.live.fetch_sub(1, Ordering::AcqRel);
    queue.exited.push(id);
    let orphaned = !queue.jobs.is_empty();
    drop(queue);

    // A wake-up consumed by this worker must not strand queued work.
    if orphaned {
        shared.jobs_await.notify_one();
    }
    shared.exited_await.notify_all();

    match exit {
        Exit::Faulted => log::warn!(
            "pool {} worker {} exited after a panicking job; capacity reduced until rescaled",
            shared.pool_id,
            id
        ),
        _ => log::debug!("pool {} worker {} exited ({:?})", shared.pool_id, id, exit),
    }
}

/// Execute a single work item with panic protection
fn execute(id: usize, work: Work, stats: &PoolStats) -> Result<(), String> {
    let start = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(work));
    let elapsed = start.elapsed();
    stats.add_busy_time(elapsed);

    match result {
        Ok(()) => {
            stats.increment_completed();
            Ok(())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!(
                "worker {} job panicked after {}ms: {}",
                id,
                elapsed.as_millis(),
                message
            );
            stats.increment_panicked();
            Err(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::work;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn spawn_worker(id: usize, shared: &Arc<Shared>) -> thread::JoinHandle<()> {
        shared.live.fetch_add(1, Ordering::AcqRel);
        let shared = Arc::clone(shared);
        thread::spawn(move || run(id, shared))
    }

    #[test]
    fn test_worker_runs_queued_jobs_in_order() {
        let shared = Arc::new(Shared::new(1000));
        let order = Arc::new(Mutex::new(Vec::new()));

        {
            let mut queue = shared.queue.lock();
            for i in 0..5 {
                let order = Arc::clone(&order);
                queue.jobs.push_back(work(move || order.lock().push(i)));
            }
            queue.lifecycle.begin_stop(StopMode::Drain);
        }

        spawn_worker(0, &shared).join().expect("Worker panicked");

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(shared.stats.get_jobs_completed(), 5);
        assert_eq!(shared.queue.lock().exited, vec![0]);
    }

    #[test]
    fn test_worker_retires_on_request() {
        let shared = Arc::new(Shared::new(1001));
        let handle = spawn_worker(4, &shared);

        {
            let mut queue = shared.queue.lock();
            queue.retire = 1;
        }
        shared.jobs_await.notify_all();
        handle.join().expect("Worker panicked");

        let queue = shared.queue.lock();
        assert_eq!(queue.retire, 0);
        assert_eq!(queue.exited, vec![4]);
    }

    #[test]
    fn test_worker_exits_after_panicking_job() {
        let shared = Arc::new(Shared::new(1002));
        let ran_after = Arc::new(AtomicUsize::new(0));

        {
            let mut queue = shared.queue.lock();
            queue.jobs.push_back(work(|| panic!("Intentional panic for testing")));
            let ran_after = Arc::clone(&ran_after);
            queue.jobs.push_back(work(move || {
                ran_after.fetch_add(1, Ordering::SeqCst);
            }));
        }

        spawn_worker(0, &shared).join().expect("Worker panicked");

        assert_eq!(shared.stats.get_jobs_panicked(), 1);
        assert_eq!(shared.live.load(Ordering::SeqCst), 0);
        assert_eq!(ran_after.load(Ordering::SeqCst), 0);
        assert_eq!(shared.queue.lock().jobs.len(), 1);
    }

    #[test]
    fn test_cancel_stop_leaves_queue_untouched() {
        let shared = Arc::new(Shared::new(1003));
        {
            let mut queue = shared.queue.lock();
            queue.jobs.push_back(work(|| {}));
            queue.lifecycle.begin_stop(StopMode::Cancel);
        }

        spawn_worker(0, &shared).join().expect("Worker panicked");

        assert_eq!(shared.stats.get_jobs_completed(), 0);
        assert_eq!(shared.queue.lock().jobs.len(), 1);
    }

    #[test]
    fn test_current_pool_is_set_on_worker() {
        let shared = Arc::new(Shared::new(1004));
        let seen = Arc::new(Mutex::new(None));

        {
            let mut queue = shared.queue.lock();
            let seen = Arc::clone(&seen);
            queue.jobs.push_back(work(move || *seen.lock() = current_pool()));
            queue.lifecycle.begin_stop(StopMode::Drain);
        }

        spawn_worker(0, &shared).join().expect("Worker panicked");

        assert_eq!(*seen.lock(), Some(1004));
        assert_eq!(current_pool(), None);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = PoolStats::new();
        stats.increment_posted();
        stats.increment_posted();
        stats.increment_posted();
        stats.increment_completed();
        stats.add_discarded(1);
        stats.add_busy_time(Duration::from_micros(40));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.jobs_posted, 3);
        assert_eq!(snapshot.pending(), 1);
        assert_eq!(stats.get_average_busy_time_us(), 40.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_snapshot_serialization() {
        let stats = PoolStats::new();
        stats.increment_posted();
        stats.increment_completed();

        let json = serde_json::to_string(&stats.snapshot()).expect("Failed to serialize");
        assert!(json.contains("\"jobs_completed\":1"));

        let back: PoolStatsSnapshot = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(back, stats.snapshot());
    }
}
