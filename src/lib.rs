//! # Rust Concurrent
//!
//! A dynamically resizable worker thread pool and a deadline-ordered timer
//! that hands expired work to a pool.
//!
//! ## Features
//!
//! - **Thread Pool**: One FIFO queue shared by a resizable set of workers
//! - **Scaling**: Grow or shrink the pool at runtime; shrinking lets busy workers finish
//! - **Graceful or Immediate Shutdown**: Drain the queue or discard it, then join every worker
//! - **Timer**: Deadline-ordered scheduling on a dedicated thread, execution on a pool
//! - **Substitution**: Pools, thread factories and clocks are all trait objects
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_concurrent::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let pool = ThreadPool::with_threads(0)?;
//! pool.scale_threads(2)?;
//!
//! for i in 0..10 {
//!     pool.execute(move || println!("Job {} executing", i))?;
//! }
//!
//! // Run everything still queued, then join the workers
//! pool.stop(false)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Timer
//!
//! ```rust
//! use rust_concurrent::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let timer = Timer::new(ThreadPool::with_threads(2)?)?;
//!
//! timer.schedule(Duration::from_millis(30), || println!("third"))?;
//! timer.schedule(Duration::from_millis(10), || println!("second"))?;
//! timer.schedule(Duration::ZERO, || println!("first"))?;
//!
//! // Waits for every deadline, then drains and stops the pool
//! timer.stop(false)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Clocks
//!
//! ```rust
//! use rust_concurrent::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let config = TimerConfig::new()
//!     .with_clock(Arc::new(MonotonicClock::new()))
//!     .with_resolution(Resolution::Milliseconds);
//!
//! let timer = Timer::with_config(ThreadPool::with_threads(1)?, config)?;
//! # timer.stop(true)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod pool;
pub mod prelude;
pub mod timer;
pub mod tracing;

pub use crate::core::{Clock, Resolution, Result, RunState, ThreadError, Work};
pub use crate::pool::{InlinePool, Pool, PoolStats, ThreadPool, ThreadPoolConfig};
pub use crate::timer::{Scheduler, Timer, TimerConfig};
