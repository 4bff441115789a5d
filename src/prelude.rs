//! Convenient re-exports for common types and traits

pub use crate::core::{
    work, Clock, MonotonicClock, NamedThreadFactory, Resolution, Result, RunState, SystemClock,
    Thread, ThreadError, ThreadFactory, Work, WorkerBody,
};
pub use crate::pool::{InlinePool, Pool, PoolStats, ThreadPool, ThreadPoolConfig};
pub use crate::timer::{Scheduler, Timer, TimerConfig};
