//! Tracing integration for observability.
//!
//! With the `tracing` feature enabled, every worker and scheduling thread
//! runs inside its own span, and [`in_current_span`] carries the caller's
//! span into posted work.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_concurrent::prelude::*;
//! use rust_concurrent::tracing::in_current_span;
//!
//! let pool = ThreadPool::with_threads(4)?;
//!
//! let span = tracing::info_span!("request", id = 7);
//! let _guard = span.enter();
//! pool.post(in_current_span(Box::new(|| tracing::info!("handled"))))?;
//! ```

use crate::core::Work;

/// Wrap `work` so it executes inside the span current at the call site.
///
/// Without the `tracing` feature the work is returned unchanged.
pub fn in_current_span(work: Work) -> Work {
    #[cfg(feature = "tracing")]
    {
        let span = ::tracing::Span::current();
        Box::new(move || {
            let _guard = span.enter();
            work()
        })
    }
    #[cfg(not(feature = "tracing"))]
    {
        work
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_wrapped_work_executes() {
        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = Arc::clone(&executed);

        let work = in_current_span(Box::new(move || {
            executed_clone.store(true, Ordering::SeqCst);
        }));
        work();

        assert!(executed.load(Ordering::SeqCst));
    }
}
