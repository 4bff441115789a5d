//! Owned worker threads and the factories that create them

use crate::core::error::{Result, ThreadError};
use crate::core::job::panic_message;
use std::fmt;
use std::thread::{self, JoinHandle, ThreadId};

/// The loop a worker thread runs until told to stop
pub type WorkerBody = Box<dyn FnOnce() + Send + 'static>;

/// An owned OS thread that is joined when dropped
///
/// Dropping a `Thread` blocks until the underlying thread exits, so no
/// execution outlives its owner.
pub struct Thread {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Thread {
    /// Wrap an already spawned thread
    pub fn from_handle(id: usize, handle: JoinHandle<()>) -> Self {
        Self {
            id,
            handle: Some(handle),
        }
    }

    /// Pool-assigned worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// OS-level identity of the thread, if it has not been joined yet
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }

    /// Whether the thread body has returned
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Join the thread, reporting a panic that escaped the body
    pub fn join(mut self) -> Result<()> {
        self.join_inner()
    }

    /// Let the thread run on without joining it
    pub fn detach(mut self) {
        self.handle.take();
    }

    fn join_inner(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        if handle.thread().id() == thread::current().id() {
            // Joining ourselves would never return; let the thread detach.
            return Err(ThreadError::join(self.id, "thread cannot join itself"));
        }

        handle
            .join()
            .map_err(|payload| ThreadError::join(self.id, panic_message(payload.as_ref())))
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Drop for Thread {
    fn drop(&mut self) {
        if let Err(e) = self.join_inner() {
            log::error!("{}", e);
        }
    }
}

/// Produces worker threads from a loop body
///
/// Implemented for any `Fn(usize, WorkerBody) -> Result<Thread>` closure, so
/// pinned, prioritised or otherwise customised threads can be plugged in
/// without touching pool logic.
pub trait ThreadFactory: Send + Sync {
    /// Start a thread with the given worker ID running `body`
    fn spawn(&self, id: usize, body: WorkerBody) -> Result<Thread>;
}

impl<F> ThreadFactory for F
where
    F: Fn(usize, WorkerBody) -> Result<Thread> + Send + Sync,
{
    fn spawn(&self, id: usize, body: WorkerBody) -> Result<Thread> {
        self(id, body)
    }
}

/// Default factory: named threads built with [`std::thread::Builder`]
#[derive(Debug, Clone)]
pub struct NamedThreadFactory {
    prefix: String,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    /// Threads are named `{prefix}-{id}`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stack_size: None,
        }
    }

    /// Set the stack size of spawned threads in bytes
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Thread name prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn spawn(&self, id: usize, body: WorkerBody) -> Result<Thread> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", self.prefix, id));
        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder
            .spawn(body)
            .map_err(|e| ThreadError::spawn_with_source(id, e.to_string(), e))?;

        Ok(Thread::from_handle(id, handle))
    }
}
