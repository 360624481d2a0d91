//! Units of work and the guarded execution wrapper shared by every policy.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AppResult;
use super::reporter::{FailureEvent, FailureReporter, TaskFailure};

/// Identifier of a task, unique within the scheduler that accepted it.
pub type TaskId = u64;

/// A submitted action. Returning `Err` counts as a failure and is reported.
pub type Action = Box<dyn FnOnce() -> AppResult<()> + Send + 'static>;

/// Whether a task may share its execution window with other tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Must run with no other task concurrently active.
    #[default]
    Serial,
    /// May run concurrently with other parallel tasks.
    Parallel,
}

impl ExecutionMode {
    /// Map the `parallel_eligible` flag used by callers onto a mode.
    #[must_use]
    pub const fn from_parallel(parallel_eligible: bool) -> Self {
        if parallel_eligible {
            Self::Parallel
        } else {
            Self::Serial
        }
    }

    /// True for [`ExecutionMode::Parallel`].
    #[must_use]
    pub const fn is_parallel(self) -> bool {
        matches!(self, Self::Parallel)
    }
}

/// A unit of submitted work: the action plus its execution mode.
pub struct Task {
    /// Identifier assigned by the accepting scheduler.
    pub id: TaskId,
    /// Execution mode requested by the submitter.
    pub mode: ExecutionMode,
    action: Action,
}

impl Task {
    /// Wrap an action.
    #[must_use]
    pub fn new(id: TaskId, mode: ExecutionMode, action: Action) -> Self {
        Self { id, mode, action }
    }

    /// Consume the task and run its action, catching panics.
    ///
    /// # Errors
    ///
    /// Returns the [`TaskFailure`] if the action panicked or returned `Err`.
    pub fn run(self) -> Result<(), TaskFailure> {
        let action = self.action;
        match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskFailure::Errored(format!("{err:#}"))),
            Err(payload) => Err(TaskFailure::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Identity of the scheduler running a task, plus where its failures go.
#[derive(Clone)]
pub(crate) struct ExecutionContext {
    pub scheduler_id: Uuid,
    pub policy: &'static str,
    pub reporter: Arc<dyn FailureReporter>,
}

impl ExecutionContext {
    pub(crate) fn new(
        scheduler_id: Uuid,
        policy: &'static str,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            scheduler_id,
            policy,
            reporter,
        }
    }

    /// Run a task and forward any failure to the reporter.
    ///
    /// Returns true when the action completed without failing.
    pub(crate) fn execute(&self, task: Task) -> bool {
        let task_id = task.id;
        match task.run() {
            Ok(()) => true,
            Err(failure) => {
                self.report(task_id, failure);
                false
            }
        }
    }

    pub(crate) fn report(&self, task_id: TaskId, failure: TaskFailure) {
        let event = FailureEvent::new(self.scheduler_id, self.policy, task_id, failure);
        // A reporter that panics must not take the worker down with it.
        let reporter = Arc::clone(&self.reporter);
        if panic::catch_unwind(AssertUnwindSafe(move || reporter.report(event))).is_err() {
            tracing::error!(
                scheduler_id = %self.scheduler_id,
                task_id,
                "failure reporter panicked"
            );
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return (*s).to_string();
    }
    if let Some(s) = payload.downcast_ref::<String>() {
        return s.clone();
    }
    "<non-string panic payload>".to_string()
}
