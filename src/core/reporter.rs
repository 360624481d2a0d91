//! Failure reporting for submitted actions.
//!
//! Schedulers never surface action failures to the submitter. Each failure is
//! turned into a [`FailureEvent`] and handed to the [`FailureReporter`] the
//! scheduler was built with.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;
use uuid::Uuid;

use super::task::TaskId;
use crate::util::clock::now_ms;

/// Why a task did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    /// The action panicked.
    #[error("action panicked: {0}")]
    Panicked(String),
    /// The action returned an error.
    #[error("action failed: {0}")]
    Errored(String),
    /// The execution facility refused the task; it never ran.
    #[error("task rejected: {0}")]
    Rejected(String),
}

/// A single failure observed by a scheduler.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    /// Instance that accepted the task.
    pub scheduler_id: Uuid,
    /// Policy label of that instance (`immediate`, `batch`, `debounce`).
    pub policy: &'static str,
    /// Task identifier within the scheduler.
    pub task_id: TaskId,
    /// What went wrong.
    pub failure: TaskFailure,
    /// Timestamp milliseconds.
    pub occurred_at_ms: u128,
}

impl FailureEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn new(
        scheduler_id: Uuid,
        policy: &'static str,
        task_id: TaskId,
        failure: TaskFailure,
    ) -> Self {
        Self {
            scheduler_id,
            policy,
            task_id,
            failure,
            occurred_at_ms: now_ms(),
        }
    }
}

/// Observer for action failures. Called from worker threads.
pub trait FailureReporter: Send + Sync {
    /// Record a failure event.
    fn report(&self, event: FailureEvent);
}

/// Default reporter: logs every failure at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, event: FailureEvent) {
        tracing::error!(
            scheduler_id = %event.scheduler_id,
            policy = event.policy,
            task_id = event.task_id,
            error = %event.failure,
            "scheduled task failed"
        );
    }
}

/// In-memory reporter for testing and dev, keeping the most recent events.
pub struct InMemoryReporter {
    events: Mutex<VecDeque<FailureEvent>>,
    max_events: usize,
}

impl InMemoryReporter {
    /// Create a reporter with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<FailureEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Default for InMemoryReporter {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl FailureReporter for InMemoryReporter {
    fn report(&self, event: FailureEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}
