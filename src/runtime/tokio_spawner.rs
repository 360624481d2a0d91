//! Tokio runtime spawner implementation.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::core::{Job, SchedulerError, Spawn};

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const DISCARDED: u8 = 2;

/// Spawner that runs jobs on a Tokio runtime's blocking thread pool.
///
/// Jobs are plain blocking closures, so they go through `spawn_blocking`
/// rather than onto the async worker threads.
#[derive(Clone)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Create a `TokioSpawner` from a tokio runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Create a `TokioSpawner` for the runtime the caller is running on.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] when called outside a Tokio
    /// runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::InvalidConfig(format!("no tokio runtime: {e}")))
    }
}

/// Records whether a job handed to Tokio started or was discarded unrun.
struct Admission {
    state: Arc<AtomicU8>,
}

impl Admission {
    fn run(self, job: Job) {
        let _ = self
            .state
            .compare_exchange(PENDING, STARTED, Ordering::AcqRel, Ordering::Acquire);
        job();
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        // No-op once started.
        let _ = self
            .state
            .compare_exchange(PENDING, DISCARDED, Ordering::AcqRel, Ordering::Acquire);
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, job: Job) -> Result<(), SchedulerError> {
        let state = Arc::new(AtomicU8::new(PENDING));
        let admission = Admission {
            state: Arc::clone(&state),
        };

        // A runtime that has shut down cancels the blocking task inside
        // `spawn_blocking`, dropping the closure before returning.
        drop(self.handle.spawn_blocking(move || admission.run(job)));

        if state.load(Ordering::Acquire) == DISCARDED {
            return Err(SchedulerError::Shutdown);
        }
        Ok(())
    }
}
