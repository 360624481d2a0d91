//! Pass-through scheduler that runs every action on the caller's thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use super::reporter::{FailureReporter, TracingReporter};
use super::scheduler::{Policy, Scheduler};
use super::task::{Action, ExecutionContext, ExecutionMode, Task};

const POLICY: &str = "immediate";

/// Runs each action synchronously inside `submit`.
///
/// Makes asynchronous call sites deterministic in tests: side effects are
/// complete by the time `submit` returns. Failures are still caught and
/// reported, never propagated to the caller.
pub struct ImmediateScheduler {
    id: Uuid,
    context: ExecutionContext,
    next_task_id: AtomicU64,
}

impl ImmediateScheduler {
    /// Create a scheduler reporting failures to `reporter`.
    #[must_use]
    pub fn new(reporter: Arc<dyn FailureReporter>) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            context: ExecutionContext::new(id, POLICY, reporter),
            next_task_id: AtomicU64::new(0),
        }
    }
}

impl Default for ImmediateScheduler {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}

impl Scheduler for ImmediateScheduler {
    fn submit(&self, action: Action, mode: ExecutionMode) {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.context.execute(Task::new(task_id, mode, action));
    }

    fn policy(&self) -> Policy {
        Policy::Immediate
    }

    fn id(&self) -> Uuid {
        self.id
    }
}
