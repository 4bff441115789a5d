//! Timer implementation

use crate::core::clock::{Clock, Resolution, SystemClock};
use crate::core::state::{Lifecycle, RunState, StopMode};
use crate::core::thread::{NamedThreadFactory, Thread, ThreadFactory};
use crate::core::{Result, ThreadError, Work};
use crate::pool::Pool;
use crate::timer::deadline::DeadlineSet;
use crate::timer::Scheduler;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

const COMPONENT: &str = "timer";

/// Configuration for a timer
#[derive(Clone)]
pub struct TimerConfig {
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Granularity of deadlines and timeouts
    pub resolution: Resolution,
    /// Name of the scheduling thread
    pub thread_name: String,
}

impl std::fmt::Debug for TimerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerConfig")
            .field("clock", &self.clock.name())
            .field("resolution", &self.resolution)
            .field("thread_name", &self.thread_name)
            .finish()
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            resolution: Resolution::Nanoseconds,
            thread_name: "timer".to_string(),
        }
    }
}

impl TimerConfig {
    /// Wall clock at nanosecond resolution
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the clock
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the resolution
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set the scheduling thread name
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.thread_name.is_empty() {
            return Err(ThreadError::invalid_config(
                "thread_name",
                "Thread name must not be empty",
            ));
        }
        Ok(())
    }
}

/// State guarded by the deadline lock
struct Schedule {
    deadlines: DeadlineSet,
    lifecycle: Lifecycle,
    /// Deadline the scheduling thread is sleeping towards; `None` while idle
    /// or dispatching
    armed: Option<Duration>,
}

struct TimerShared {
    schedule: Mutex<Schedule>,
    jobs_await: Condvar,
    clock: Arc<dyn Clock>,
    resolution: Resolution,
    pool: Arc<dyn Pool>,
}

impl TimerShared {
    fn now(&self) -> Duration {
        self.resolution.truncate(self.clock.now())
    }

    /// Hand due work to the pool, in order, outside the deadline lock
    fn dispatch(&self, due: Vec<Work>) {
        log::trace!("timer dispatching {} jobs", due.len());
        for work in due {
            if let Err(e) = self.pool.post(work) {
                log::warn!("timer job discarded: {}", e);
            }
        }
    }

    /// Scheduling loop
    ///
    /// Sleeps until the earliest deadline, a new earlier deadline, or a stop.
    /// Never executes work itself.
    fn run(&self) {
        #[cfg(feature = "tracing")]
        let _span = ::tracing::debug_span!("timer", clock = self.clock.name()).entered();

        log::debug!("timer scheduler started ({} clock)", self.clock.name());

        let mut schedule = self.schedule.lock();
        loop {
            match schedule.lifecycle.mode() {
                Some(StopMode::Cancel) => break,
                Some(StopMode::Drain) if schedule.deadlines.is_empty() => break,
                _ => {}
            }

            let due = schedule.deadlines.pop_due(self.now());
            if !due.is_empty() {
                schedule.armed = None;
                MutexGuard::unlocked(&mut schedule, || self.dispatch(due));
                continue;
            }

            match schedule.deadlines.earliest() {
                Some(deadline) => {
                    schedule.armed = Some(deadline);
                    let timeout = deadline.saturating_sub(self.clock.now());
                    self.jobs_await.wait_for(&mut schedule, timeout);
                }
                None => {
                    schedule.armed = None;
                    self.jobs_await.wait(&mut schedule);
                }
            }
        }
        schedule.armed = None;
        drop(schedule);

        log::debug!("timer scheduler exited");
    }
}

/// Deadline-ordered timer that posts expired work to a pool it owns
///
/// A single scheduling thread tracks deadlines; expired work is handed to
/// the pool, so slow work never delays the next deadline.
///
/// # Example
///
/// ```rust
/// use rust_concurrent::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let timer = Timer::new(ThreadPool::with_threads(1)?)?;
///
/// timer.schedule(Duration::from_millis(20), || println!("later"))?;
/// timer.schedule(Duration::ZERO, || println!("now"))?;
///
/// // Wait for both deadlines, then drain the pool
/// timer.stop(false)?;
/// # Ok(())
/// # }
/// ```
///
/// # Teardown
///
/// Dropping a timer that has not been stopped performs `stop(true)`.
pub struct Timer {
    shared: Arc<TimerShared>,
    /// Structural lock: the scheduling thread, held across `stop`
    scheduler: Mutex<Option<Thread>>,
    scheduler_id: Option<ThreadId>,
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("clock", &self.shared.clock.name())
            .field("resolution", &self.shared.resolution)
            .field("pending", &self.len())
            .field("state", &self.state())
            .finish()
    }
}

impl Timer {
    /// Create a wall-clock, nanosecond-resolution timer over `pool`
    pub fn new<P: Pool + 'static>(pool: P) -> Result<Self> {
        Self::with_config(pool, TimerConfig::default())
    }

    /// Create a timer with custom configuration
    pub fn with_config<P: Pool + 'static>(pool: P, config: TimerConfig) -> Result<Self> {
        Self::from_shared_pool(Arc::new(pool), config)
    }

    /// Create a timer over an already shared pool
    pub fn from_shared_pool(pool: Arc<dyn Pool>, config: TimerConfig) -> Result<Self> {
        config.validate()?;

        let shared = Arc::new(TimerShared {
            schedule: Mutex::new(Schedule {
                deadlines: DeadlineSet::new(),
                lifecycle: Lifecycle::default(),
                armed: None,
            }),
            jobs_await: Condvar::new(),
            clock: config.clock,
            resolution: config.resolution,
            pool,
        });

        let shared_clone = Arc::clone(&shared);
        let thread = NamedThreadFactory::new(config.thread_name)
            .spawn(0, Box::new(move || shared_clone.run()))?;

        Ok(Self {
            shared,
            scheduler_id: thread.thread_id(),
            scheduler: Mutex::new(Some(thread)),
        })
    }

    /// Schedule a closure to be posted after `timeout`
    pub fn schedule<F>(&self, timeout: Duration, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.expires_from_now(timeout, Box::new(f))
    }

    /// Current timepoint according to the configured clock and resolution
    pub fn now(&self) -> Duration {
        self.shared.now()
    }

    /// Number of jobs waiting for their deadline
    pub fn len(&self) -> usize {
        self.shared.schedule.lock().deadlines.len()
    }

    /// Whether no job is waiting for its deadline
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunState {
        self.shared.schedule.lock().lifecycle.state()
    }

    /// Check if the timer still accepts work
    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// The pool expired work is posted to
    pub fn pool(&self) -> &dyn Pool {
        self.shared.pool.as_ref()
    }

    fn on_scheduler_thread(&self) -> bool {
        self.scheduler_id == Some(thread::current().id())
    }
}

impl Scheduler for Timer {
    /// Post `work` to the pool once `timeout` has elapsed.
    ///
    /// The deadline is `now + timeout`, both truncated to the configured
    /// resolution. A zero timeout fires on the scheduling thread's next pass.
    /// The scheduling thread is woken only if the new deadline is earlier
    /// than the one it is sleeping towards.
    fn expires_from_now(&self, timeout: Duration, work: Work) -> Result<()> {
        let wake = {
            let mut schedule = self.shared.schedule.lock();
            if !schedule.lifecycle.is_running() {
                return Err(ThreadError::stopped(COMPONENT));
            }

            let deadline = self
                .shared
                .now()
                .checked_add(self.shared.resolution.truncate(timeout))
                .unwrap_or(Duration::MAX);
            schedule.deadlines.push(deadline, work);

            schedule.armed.map_or(true, |armed| deadline < armed)
        };

        if wake {
            self.shared.jobs_await.notify_one();
        }
        Ok(())
    }

    /// Stop the timer, then its pool, with the same `cancel_tasks` flag.
    ///
    /// Without cancellation the scheduling thread keeps running until every
    /// pending deadline has fired and been posted, and the pool then drains.
    ///
    /// `stop(true)` discards pending deadlines and the pool's queue before
    /// waiting, so it also cuts short a drain already in progress.
    fn stop(&self, cancel_tasks: bool) -> Result<()> {
        if self.on_scheduler_thread() {
            return Err(ThreadError::called_from_worker(COMPONENT));
        }

        let mode = StopMode::from_cancel(cancel_tasks);
        let discarded = {
            let mut schedule = self.shared.schedule.lock();
            if schedule.lifecycle.begin_stop(mode) {
                log::debug!("timer stopping ({:?})", mode);
            }
            if mode == StopMode::Cancel {
                schedule.deadlines.take_all()
            } else {
                Vec::new()
            }
        };
        self.shared.jobs_await.notify_all();
        if !discarded.is_empty() {
            log::debug!("timer discarded {} pending jobs", discarded.len());
        }
        drop(discarded);
        if mode == StopMode::Cancel {
            self.shared.pool.cancel_all();
        }

        // Structural lock: a concurrent stop finishes joining first
        let mut scheduler = self.scheduler.lock();
        let joined = scheduler.take().map_or(Ok(()), Thread::join);
        if let Err(e) = &joined {
            log::error!("{}", e);
        }

        let stopped = self.shared.pool.stop(cancel_tasks);

        self.shared.schedule.lock().lifecycle.finish();
        joined.and(stopped)
    }

    fn cancel_all(&self) {
        let discarded = self.shared.schedule.lock().deadlines.take_all();
        self.shared.jobs_await.notify_all();
        if !discarded.is_empty() {
            log::debug!("timer discarded {} pending jobs", discarded.len());
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.state() == RunState::Stopped {
            return;
        }

        if self.on_scheduler_thread() {
            // Dropped by work running on the scheduling thread: it exits on
            // its own once it sees the stop, and releases the pool then.
            self.shared
                .schedule
                .lock()
                .lifecycle
                .begin_stop(StopMode::Cancel);
            self.shared.jobs_await.notify_all();
            if let Some(thread) = self.scheduler.lock().take() {
                thread.detach();
            }
            log::warn!("timer dropped from its scheduling thread; thread was detached");
            return;
        }

        if let Err(e) = self.stop(true) {
            log::error!("Failed to stop timer during drop: {}", e);
        }
    }
}
