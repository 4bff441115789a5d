//! Thread pool implementation

use crate::core::state::{RunState, StopMode};
use crate::core::thread::{NamedThreadFactory, Thread, ThreadFactory};
use crate::core::{Result, ThreadError, Work};
use crate::pool::worker::{self, PoolStats, Shared};
use crate::pool::Pool;
use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const COMPONENT: &str = "thread pool";

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(1);

/// Configuration for thread pool
#[derive(Clone)]
pub struct ThreadPoolConfig {
    /// Number of worker threads started with the pool (0 is allowed)
    pub num_threads: usize,
    /// Thread name prefix used by the default thread factory
    pub thread_name_prefix: String,
    /// Stack size for worker threads created by the default thread factory
    pub stack_size: Option<usize>,
    /// Custom thread factory (if None, uses [`NamedThreadFactory`])
    thread_factory: Option<Arc<dyn ThreadFactory>>,
}

impl std::fmt::Debug for ThreadPoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolConfig")
            .field("num_threads", &self.num_threads)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stack_size", &self.stack_size)
            .field(
                "thread_factory",
                &self.thread_factory.as_ref().map(|_| "<custom factory>"),
            )
            .finish()
    }
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get(),
            thread_name_prefix: "worker".to_string(),
            stack_size: None,
            thread_factory: None,
        }
    }
}

impl ThreadPoolConfig {
    /// Create a new configuration with specified number of threads
    #[must_use]
    pub fn new(num_threads: usize) -> Self {
        Self {
            num_threads,
            ..Default::default()
        }
    }

    /// Set thread name prefix
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the stack size of worker threads in bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Set a custom thread factory.
    ///
    /// When a factory is provided, `thread_name_prefix` and `stack_size` are
    /// ignored as threads are created entirely by the factory.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rust_concurrent::prelude::*;
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<()> {
    /// let factory = |id: usize, body: WorkerBody| -> Result<Thread> {
    ///     let handle = std::thread::Builder::new()
    ///         .name(format!("pinned-{}", id))
    ///         .spawn(body)
    ///         .map_err(|e| ThreadError::spawn(id, e.to_string()))?;
    ///     Ok(Thread::from_handle(id, handle))
    /// };
    ///
    /// let config = ThreadPoolConfig::new(2).with_thread_factory(Arc::new(factory));
    /// let pool = ThreadPool::with_config(config)?;
    /// pool.stop(false)?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_factory(mut self, factory: Arc<dyn ThreadFactory>) -> Self {
        self.thread_factory = Some(factory);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.stack_size == Some(0) {
            return Err(ThreadError::invalid_config(
                "stack_size",
                "Stack size must be greater than 0",
            ));
        }
        if self.thread_factory.is_none() && self.thread_name_prefix.is_empty() {
            return Err(ThreadError::invalid_config(
                "thread_name_prefix",
                "Thread name prefix must not be empty",
            ));
        }
        Ok(())
    }

    fn factory(&self) -> Arc<dyn ThreadFactory> {
        match &self.thread_factory {
            Some(factory) => Arc::clone(factory),
            None => {
                let mut factory = NamedThreadFactory::new(self.thread_name_prefix.clone());
                if let Some(size) = self.stack_size {
                    factory = factory.with_stack_size(size);
                }
                Arc::new(factory)
            }
        }
    }
}

/// Worker collection guarded by the structural lock
#[derive(Default)]
struct Workers {
    threads: Vec<Thread>,
    next_id: usize,
}

impl Workers {
    /// Detach the threads whose IDs are listed
    fn take(&mut self, ids: &[usize]) -> Vec<Thread> {
        let (gone, live) = std::mem::take(&mut self.threads)
            .into_iter()
            .partition(|thread| ids.contains(&thread.id()));
        self.threads = live;
        gone
    }
}

/// A dynamically resizable pool of worker threads sharing one FIFO queue
///
/// # Locking
///
/// The job lock guards the queue and lifecycle; the structural lock guards
/// the worker collection and is held for the whole of a scale or stop, so
/// those operations never overlap. Neither lock is held while work runs.
///
/// # Teardown
///
/// Dropping a pool that has not been stopped performs `stop(true)`: queued
/// work is discarded and every worker is joined before `drop` returns.
pub struct ThreadPool {
    config: ThreadPoolConfig,
    factory: Arc<dyn ThreadFactory>,
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("id", &self.shared.pool_id)
            .field("config", &self.config)
            .field("num_threads", &self.num_threads())
            .field("state", &self.state())
            .finish()
    }
}

impl ThreadPool {
    /// Create a new thread pool with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ThreadPoolConfig::default())
    }

    /// Create a thread pool with specified number of threads
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        Self::with_config(ThreadPoolConfig::new(num_threads))
    }

    /// Create a thread pool with custom configuration
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self> {
        config.validate()?;

        let pool = Self {
            factory: config.factory(),
            shared: Arc::new(Shared::new(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))),
            workers: Mutex::new(Workers::default()),
            config,
        };

        pool.scale_threads(pool.config.num_threads)?;
        Ok(pool)
    }

    /// Post a closure as a work item
    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Box::new(f))
    }

    /// Get the number of live worker threads
    ///
    /// A worker stops counting as soon as it leaves its loop, including
    /// after a panicking job, even before the next scale reaps it.
    pub fn num_threads(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Get current queue length
    ///
    /// Approximate, as it may change between checking and using it.
    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().jobs.len()
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.shared.queue.lock().lifecycle.state()
    }

    /// Check if the pool still accepts work
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Get pool statistics
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Get the configuration the pool was built with
    pub fn config(&self) -> &ThreadPoolConfig {
        &self.config
    }

    fn ensure_external(&self) -> Result<()> {
        if worker::current_pool() == Some(self.shared.pool_id) {
            return Err(ThreadError::called_from_worker(COMPONENT));
        }
        Ok(())
    }

    fn discard(&self, jobs: VecDeque<Work>) {
        if jobs.is_empty() {
            return;
        }
        log::debug!(
            "pool {} discarded {} queued jobs",
            self.shared.pool_id,
            jobs.len()
        );
        self.shared.stats.add_discarded(jobs.len());
        drop(jobs);
    }

    fn join_all(threads: Vec<Thread>) -> Result<()> {
        let mut result = Ok(());
        for thread in threads {
            if let Err(e) = thread.join() {
                log::error!("{}", e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Bring the live worker count down to at most `target`.
    ///
    /// Joins workers that already left (retired or faulted) and issues retire
    /// requests for the excess. Returns the live count afterwards.
    fn shrink_to(&self, workers: &mut Workers, target: usize) -> Result<usize> {
        let shared = &self.shared;
        let mut queue = shared.queue.lock();

        loop {
            let exited = std::mem::take(&mut queue.exited);
            if !exited.is_empty() {
                let gone = workers.take(&exited);
                MutexGuard::unlocked(&mut queue, || Self::join_all(gone))?;
                continue;
            }

            if !queue.lifecycle.is_running() {
                return Err(ThreadError::stopped(COMPONENT));
            }

            let live = workers.threads.len();
            if live <= target {
                queue.retire = 0;
                return Ok(live);
            }

            queue.retire = live - target;
            MutexGuard::unlocked(&mut queue, || shared.jobs_await.notify_all());
            while queue.exited.is_empty() {
                shared.exited_await.wait(&mut queue);
            }
        }
    }

    fn spawn_worker(&self, workers: &mut Workers) -> Result<()> {
        let id = workers.next_id;
        workers.next_id += 1;

        let shared = Arc::clone(&self.shared);
        self.shared.live.fetch_add(1, Ordering::AcqRel);
        let thread = match self
            .factory
            .spawn(id, Box::new(move || worker::run(id, shared)))
        {
            Ok(thread) => thread,
            Err(e) => {
                self.shared.live.fetch_sub(1, Ordering::AcqRel);
                return Err(e);
            }
        };

        workers.threads.push(thread);
        Ok(())
    }
}

impl Pool for ThreadPool {
    /// Resize the pool to exactly `num_threads` workers.
    ///
    /// Growing spawns new workers through the thread factory. Shrinking lets
    /// the excess workers finish their in-flight item, then joins them.
    /// Workers lost to a panicking job are replaced.
    ///
    /// # Errors
    ///
    /// - `ThreadError::CalledFromWorker` - called from one of this pool's workers
    /// - `ThreadError::Stopped` - the pool has been stopped
    /// - `ThreadError::SpawnError` - the factory failed; the pool keeps the
    ///   workers spawned so far
    fn scale_threads(&self, num_threads: usize) -> Result<()> {
        self.ensure_external()?;

        let mut workers = self.workers.lock();
        let live = self.shrink_to(&mut workers, num_threads)?;

        for _ in live..num_threads {
            self.spawn_worker(&mut workers)?;
        }

        log::debug!(
            "pool {} scaled from {} to {} threads",
            self.shared.pool_id,
            live,
            num_threads
        );
        Ok(())
    }

    fn post(&self, work: Work) -> Result<()> {
        let mut queue = self.shared.queue.lock();
        if !queue.lifecycle.is_running() {
            drop(queue);
            self.shared.stats.increment_rejected();
            return Err(ThreadError::stopped(COMPONENT));
        }

        queue.jobs.push_back(work);
        self.shared.stats.increment_posted();
        drop(queue);

        self.shared.jobs_await.notify_one();
        Ok(())
    }

    /// Stop the pool and wait for all workers to finish
    ///
    /// # Graceful Shutdown
    ///
    /// With `cancel_tasks == false`:
    /// 1. Stops accepting new work
    /// 2. Wakes every worker
    /// 3. Waits for the workers to drain the queue and exit
    ///
    /// # Thread Safety
    ///
    /// Only the first call chooses the mode. Later calls block until the
    /// pool is fully stopped; `stop(true)` still discards whatever remains
    /// queued.
    fn stop(&self, cancel_tasks: bool) -> Result<()> {
        self.ensure_external()?;

        let mode = StopMode::from_cancel(cancel_tasks);
        let discarded = {
            let mut queue = self.shared.queue.lock();
            if queue.lifecycle.begin_stop(mode) {
                log::debug!("pool {} stopping ({:?})", self.shared.pool_id, mode);
            }
            if mode == StopMode::Cancel {
                std::mem::take(&mut queue.jobs)
            } else {
                VecDeque::new()
            }
        };
        self.shared.jobs_await.notify_all();
        self.discard(discarded);

        let mut workers = self.workers.lock();
        let threads = std::mem::take(&mut workers.threads);
        let result = Self::join_all(threads);

        let leftover = {
            let mut queue = self.shared.queue.lock();
            queue.exited.clear();
            queue.retire = 0;
            queue.lifecycle.finish();
            std::mem::take(&mut queue.jobs)
        };
        if !leftover.is_empty() {
            log::warn!(
                "pool {} stopped with no workers left to drain {} jobs",
                self.shared.pool_id,
                leftover.len()
            );
        }
        self.discard(leftover);

        result
    }

    fn cancel_all(&self) {
        let discarded = std::mem::take(&mut self.shared.queue.lock().jobs);
        self.discard(discarded);
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        if self.state() == RunState::Stopped {
            return;
        }

        if worker::current_pool() == Some(self.shared.pool_id) {
            // Dropped by one of its own jobs: joining would wait on ourselves.
            self.shared
                .queue
                .lock()
                .lifecycle
                .begin_stop(StopMode::Cancel);
            self.shared.jobs_await.notify_all();
            for thread in std::mem::take(&mut self.workers.lock().threads) {
                thread.detach();
            }
            log::warn!(
                "pool {} dropped from its own worker; threads were detached",
                self.shared.pool_id
            );
            return;
        }

        if let Err(e) = self.stop(true) {
            log::error!(
                "Failed to stop thread pool '{}' during drop: {}",
                self.config.thread_name_prefix,
                e
            );
        }
    }
}
