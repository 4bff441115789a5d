//! Core types and traits shared by the pool and the timer

pub mod clock;
pub mod error;
pub mod job;
pub mod state;
pub mod thread;

pub use clock::{Clock, MonotonicClock, Resolution, SystemClock};
pub use error::{Result, ThreadError};
pub use job::{work, Work};
pub use state::{RunState, StopMode};
pub use thread::{NamedThreadFactory, Thread, ThreadFactory, WorkerBody};
