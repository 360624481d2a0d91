//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
///
/// These cover misuse and construction failures. Failures raised by submitted
/// actions never surface here; they are delivered to a
/// [`FailureReporter`](crate::core::FailureReporter) instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The factory was handed a scheduler whose policy it cannot reproduce.
    #[error("unrecognized scheduler policy: {0}")]
    UnrecognizedPolicy(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A background thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[from] std::io::Error),
    /// The execution facility no longer accepts work.
    #[error("scheduler has been shut down")]
    Shutdown,
}

/// Application-facing result using anyhow; the return type of submitted actions.
pub type AppResult<T> = Result<T, anyhow::Error>;
