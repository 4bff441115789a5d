//! Error types for the pool and timer

/// Result type for pool and timer operations
pub type Result<T> = std::result::Result<T, ThreadError>;

/// Errors that can occur in the pool and timer
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ThreadError {
    /// The component has been stopped and no longer accepts work
    #[error("{component} is stopped")]
    Stopped {
        /// Name of the stopped component
        component: String,
    },

    /// A blocking operation was invoked from one of the component's own threads
    #[error("{component} cannot be scaled or stopped from one of its own threads")]
    CalledFromWorker {
        /// Name of the component
        component: String,
    },

    /// Failed to spawn a worker thread with details
    #[error("Failed to spawn worker thread #{thread_id}: {message}")]
    SpawnError {
        /// ID of the thread that failed to spawn
        thread_id: usize,
        /// Error message
        message: String,
        /// Source IO error
        #[source]
        source: Option<std::io::Error>,
    },

    /// Failed to join a worker thread
    #[error("Failed to join worker thread #{thread_id}: {message}")]
    JoinError {
        /// ID of the thread that failed to join
        thread_id: usize,
        /// Error message
        message: String,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },
}

impl ThreadError {
    /// Create a stopped error
    pub fn stopped(component: impl Into<String>) -> Self {
        ThreadError::Stopped {
            component: component.into(),
        }
    }

    /// Create a called-from-worker error
    pub fn called_from_worker(component: impl Into<String>) -> Self {
        ThreadError::CalledFromWorker {
            component: component.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: None,
        }
    }

    /// Create a spawn error with source
    pub fn spawn_with_source(
        thread_id: usize,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        ThreadError::SpawnError {
            thread_id,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a join error
    pub fn join(thread_id: usize, message: impl Into<String>) -> Self {
        ThreadError::JoinError {
            thread_id,
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ThreadError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }
}
