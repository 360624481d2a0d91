//! FIFO batching scheduler.
//!
//! Runs a contiguous run of parallel tasks together and every serial task
//! alone. All queue and running-count bookkeeping is owned by a single
//! coordinator thread; submitters and workers only talk to it over channels.
//!
//! # Dispatch rules
//!
//! - Work is only started when nothing is running (idle-triggered).
//! - On idle, the maximal parallel prefix of the queue starts at once; if the
//!   head is serial, exactly that task starts, alone.
//! - A submission that arrives while tasks run is queued and waits for the
//!   running set to empty, even if it is parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_dispatch::config::BatchConfig;
//! use prometheus_dispatch::core::{BatchScheduler, SchedulerExt, TracingReporter};
//!
//! let scheduler = BatchScheduler::new(BatchConfig::default(), Arc::new(TracingReporter))?;
//! scheduler.submit_parallel(|| render_thumbnail(1));
//! scheduler.submit_parallel(|| render_thumbnail(2));
//! scheduler.submit_serial(|| rebuild_peak_index());
//! ```

mod queue;

pub use queue::BatchQueue;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::SchedulerError;
use super::reporter::{FailureReporter, TaskFailure};
use super::scheduler::{Policy, Scheduler};
use super::task::{Action, ExecutionContext, ExecutionMode, Task, TaskId};
use super::worker_pool::{Job, Spawn, WorkerPool};
use crate::config::BatchConfig;

const POLICY: &str = "batch";

/// Observable batch scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSnapshot {
    /// Tasks accepted by `submit`.
    pub submitted: u64,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Tasks currently executing.
    pub running: usize,
    /// Tasks finished, successfully or not.
    pub completed: u64,
    /// Finished tasks that panicked, errored or were rejected.
    pub failed: u64,
}

impl BatchSnapshot {
    /// True when every submitted task has finished.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.completed == self.submitted
    }
}

/// Published counters plus a condvar signalled on every change.
#[derive(Default)]
struct BatchMonitor {
    state: Mutex<BatchSnapshot>,
    changed: Condvar,
}

impl BatchMonitor {
    fn update(&self, f: impl FnOnce(&mut BatchSnapshot)) {
        let mut state = self.state.lock();
        f(&mut state);
        drop(state);
        self.changed.notify_all();
    }

    fn snapshot(&self) -> BatchSnapshot {
        *self.state.lock()
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();
        while !state.is_idle() {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return state.is_idle();
                    }
                }
                // Too far out to represent; wait without a deadline.
                None => self.changed.wait(&mut state),
            }
        }
        true
    }
}

/// Message from a worker: a started task has finished.
#[derive(Debug, Clone, Copy)]
struct Completion {
    task_id: TaskId,
    succeeded: bool,
}

/// Releases a running slot when dropped, on every exit path.
///
/// Dropped after the task body returns, while unwinding, or together with a
/// job the execution facility refused to run.
struct CompletionGuard {
    task_id: TaskId,
    succeeded: bool,
    completions: Sender<Completion>,
}

impl CompletionGuard {
    /// Run the task, then release the slot when `self` drops.
    fn run(mut self, context: &ExecutionContext, task: Task) {
        self.succeeded = context.execute(task);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // The coordinator holds a sender clone for its whole life, so this
        // only fails once it has exited.
        let _ = self.completions.send(Completion {
            task_id: self.task_id,
            succeeded: self.succeeded,
        });
    }
}

/// Batching FIFO scheduler.
pub struct BatchScheduler {
    id: Uuid,
    config: BatchConfig,
    submissions: Sender<Task>,
    next_task_id: AtomicU64,
    monitor: Arc<BatchMonitor>,
    context: ExecutionContext,
}

impl BatchScheduler {
    /// Create a scheduler running tasks on its own [`WorkerPool`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a thread cannot be
    /// started.
    pub fn new(
        config: BatchConfig,
        reporter: Arc<dyn FailureReporter>,
    ) -> Result<Self, SchedulerError> {
        let pool = WorkerPool::new(config.workers.clone())?;
        Self::with_spawner(config, Arc::new(pool), reporter)
    }

    /// Create a scheduler running tasks on the given execution facility.
    ///
    /// `config.workers` is kept only so [`Scheduler::policy`] can describe
    /// this instance.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::WorkerSpawn`] if the coordinator thread
    /// cannot be started.
    pub fn with_spawner(
        config: BatchConfig,
        spawner: Arc<dyn Spawn>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Result<Self, SchedulerError> {
        let id = Uuid::new_v4();
        let context = ExecutionContext::new(id, POLICY, reporter);
        let monitor = Arc::new(BatchMonitor::default());
        let (submissions, submission_rx) = unbounded::<Task>();
        let (completion_tx, completion_rx) = unbounded::<Completion>();

        let coordinator = Coordinator {
            scheduler_id: id,
            queue: BatchQueue::new(),
            running: 0,
            spawner,
            context: context.clone(),
            completion_tx,
            monitor: Arc::clone(&monitor),
        };

        thread::Builder::new()
            .name("batch-coordinator".into())
            .spawn(move || coordinator.run(&submission_rx, &completion_rx))?;

        info!(scheduler_id = %id, "batch scheduler started");

        Ok(Self {
            id,
            config,
            submissions,
            next_task_id: AtomicU64::new(0),
            monitor,
            context,
        })
    }

    /// Current counters.
    #[must_use]
    pub fn snapshot(&self) -> BatchSnapshot {
        self.monitor.snapshot()
    }

    /// Block until every submitted task has finished or `timeout` elapses.
    ///
    /// Returns true if the scheduler became idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.monitor.wait_idle(timeout)
    }
}

impl Scheduler for BatchScheduler {
    fn submit(&self, action: Action, mode: ExecutionMode) {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.monitor.update(|s| s.submitted += 1);

        if self.submissions.send(Task::new(task_id, mode, action)).is_err() {
            error!(scheduler_id = %self.id, task_id, "batch coordinator is gone");
            self.monitor.update(|s| {
                s.completed += 1;
                s.failed += 1;
            });
            self.context.report(
                task_id,
                TaskFailure::Rejected("batch coordinator stopped".into()),
            );
            return;
        }
        debug!(scheduler_id = %self.id, task_id, ?mode, "task submitted");
    }

    fn policy(&self) -> Policy {
        Policy::Batch(self.config.clone())
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Single owner of the queue and running count.
struct Coordinator {
    scheduler_id: Uuid,
    queue: BatchQueue,
    running: usize,
    spawner: Arc<dyn Spawn>,
    context: ExecutionContext,
    completion_tx: Sender<Completion>,
    monitor: Arc<BatchMonitor>,
}

impl Coordinator {
    fn run(mut self, submissions: &Receiver<Task>, completions: &Receiver<Completion>) {
        let mut accepting = true;
        loop {
            if accepting {
                select! {
                    recv(submissions) -> msg => match msg {
                        Ok(task) => self.enqueue(task),
                        Err(_) => {
                            debug!(scheduler_id = %self.scheduler_id, "scheduler dropped, draining");
                            accepting = false;
                        }
                    },
                    recv(completions) -> msg => {
                        if let Ok(completion) = msg {
                            self.complete(completion);
                        }
                    }
                }
            } else {
                if self.running == 0 && self.queue.is_empty() {
                    break;
                }
                match completions.recv() {
                    Ok(completion) => self.complete(completion),
                    Err(_) => break,
                }
            }
            self.try_dispatch();
        }
        debug!(scheduler_id = %self.scheduler_id, "batch coordinator exiting");
    }

    fn enqueue(&mut self, task: Task) {
        self.queue.push(task);
        let queued = self.queue.len();
        self.monitor.update(|s| s.queued = queued);
    }

    fn complete(&mut self, completion: Completion) {
        if let Some(running) = self.running.checked_sub(1) {
            self.running = running;
        } else {
            error!(
                scheduler_id = %self.scheduler_id,
                task_id = completion.task_id,
                "completion received with nothing running"
            );
        }
        debug!(
            scheduler_id = %self.scheduler_id,
            task_id = completion.task_id,
            succeeded = completion.succeeded,
            running = self.running,
            "task finished"
        );
        let running = self.running;
        self.monitor.update(|s| {
            s.running = running;
            s.completed += 1;
            if !completion.succeeded {
                s.failed += 1;
            }
        });
    }

    /// Start the next batch if, and only if, nothing is running.
    fn try_dispatch(&mut self) {
        if self.running != 0 {
            return;
        }
        let batch = self.queue.take_batch();
        if batch.is_empty() {
            return;
        }

        self.running = batch.len();
        let (queued, running) = (self.queue.len(), self.running);
        // Publish before starting so a task sees itself counted.
        self.monitor.update(|s| {
            s.queued = queued;
            s.running = running;
        });
        debug!(
            scheduler_id = %self.scheduler_id,
            batch_len = running,
            serial = running == 1 && !batch[0].mode.is_parallel(),
            "dispatching batch"
        );

        for task in batch {
            self.start(task);
        }
    }

    fn start(&self, task: Task) {
        let task_id = task.id;
        let guard = CompletionGuard {
            task_id,
            succeeded: false,
            completions: self.completion_tx.clone(),
        };
        let context = self.context.clone();
        let job: Job = Box::new(move || guard.run(&context, task));

        if let Err(e) = self.spawner.spawn(job) {
            // The rejected job, and its guard, were dropped by the spawner.
            warn!(scheduler_id = %self.scheduler_id, task_id, error = %e, "task rejected");
            self.context.report(task_id, TaskFailure::Rejected(e.to_string()));
        }
    }
}
