//! Debounce scheduler: a burst of submissions runs once, as its last action.
//!
//! Every submission replaces the pending action and pushes the deadline out
//! to `last_submit + wait`. A single waiter thread per scheduler sleeps on a
//! condvar until that deadline passes with no newer submission, then takes
//! the pending action and dispatches it to a worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::SchedulerError;
use super::reporter::{FailureReporter, TaskFailure};
use super::scheduler::{Policy, Scheduler};
use super::task::{Action, ExecutionContext, ExecutionMode, Task};
use super::worker_pool::{Spawn, WorkerPool};
use crate::config::DebounceConfig;

const POLICY: &str = "debounce";

/// Debounce scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebounceStats {
    /// Actions accepted by `submit`.
    pub submitted: u64,
    /// Actions replaced by a newer submission before firing.
    pub superseded: u64,
    /// Actions handed to a worker.
    pub fired: u64,
}

struct DebounceState {
    /// Latest submitted action; `Some` while a window is open.
    pending: Option<Task>,
    /// Elapsed time is measured from here.
    last_submit: Instant,
    flush_requested: bool,
    shutdown: bool,
}

#[derive(Default)]
struct DebounceCounters {
    submitted: AtomicU64,
    superseded: AtomicU64,
    fired: AtomicU64,
}

struct DebounceShared {
    state: Mutex<DebounceState>,
    wake: Condvar,
    counters: DebounceCounters,
}

/// Coalesces bursts of submissions into one delayed execution.
pub struct DebounceScheduler {
    id: Uuid,
    config: DebounceConfig,
    shared: Arc<DebounceShared>,
    next_task_id: AtomicU64,
}

impl DebounceScheduler {
    /// Create a scheduler firing actions on its own [`WorkerPool`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a thread cannot be
    /// started.
    pub fn new(
        config: DebounceConfig,
        reporter: Arc<dyn FailureReporter>,
    ) -> Result<Self, SchedulerError> {
        let pool = WorkerPool::new(config.workers.clone())?;
        Self::with_spawner(config, Arc::new(pool), reporter)
    }

    /// Create a scheduler firing actions on the given execution facility.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::WorkerSpawn`] if the waiter thread cannot be
    /// started.
    pub fn with_spawner(
        config: DebounceConfig,
        spawner: Arc<dyn Spawn>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Result<Self, SchedulerError> {
        let id = Uuid::new_v4();
        let shared = Arc::new(DebounceShared {
            state: Mutex::new(DebounceState {
                pending: None,
                last_submit: Instant::now(),
                flush_requested: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            counters: DebounceCounters::default(),
        });

        let waiter = Waiter {
            scheduler_id: id,
            wait: config.wait(),
            shared: Arc::clone(&shared),
            spawner,
            context: ExecutionContext::new(id, POLICY, reporter),
        };
        thread::Builder::new()
            .name("debounce-waiter".into())
            .spawn(move || waiter.run())?;

        info!(scheduler_id = %id, wait_ms = config.wait_ms, "debounce scheduler started");

        Ok(Self {
            id,
            config,
            shared,
            next_task_id: AtomicU64::new(0),
        })
    }

    /// Configured quiet period.
    #[must_use]
    pub const fn wait(&self) -> Duration {
        self.config.wait()
    }

    /// True while an action is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.shared.state.lock().pending.is_some()
    }

    /// Fire the pending action now instead of waiting out the quiet period.
    pub fn flush(&self) {
        let mut state = self.shared.state.lock();
        if state.pending.is_some() {
            state.flush_requested = true;
            drop(state);
            self.shared.wake.notify_one();
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> DebounceStats {
        let counters = &self.shared.counters;
        DebounceStats {
            submitted: counters.submitted.load(Ordering::Relaxed),
            superseded: counters.superseded.load(Ordering::Relaxed),
            fired: counters.fired.load(Ordering::Relaxed),
        }
    }
}

impl Scheduler for DebounceScheduler {
    /// `mode` is ignored; a debounced action always runs on its own.
    fn submit(&self, action: Action, mode: ExecutionMode) {
        let task_id = self.next_task_id.fetch_add(1, Ordering::Relaxed);
        self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);

        let mut state = self.shared.state.lock();
        let replaced = state.pending.replace(Task::new(task_id, mode, action));
        state.last_submit = Instant::now();
        drop(state);
        self.shared.wake.notify_one();

        if let Some(replaced) = replaced {
            self.shared.counters.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(
                scheduler_id = %self.id,
                task_id,
                superseded = replaced.id,
                "pending action replaced"
            );
        } else {
            debug!(scheduler_id = %self.id, task_id, "debounce window opened");
        }
        // Replaced action is dropped here, outside the lock.
    }

    fn policy(&self) -> Policy {
        Policy::Debounce(self.config.clone())
    }

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        // The waiter fires whatever is still pending, then exits.
        self.shared.state.lock().shutdown = true;
        self.shared.wake.notify_one();
    }
}

/// Background waiter owning the deadline logic.
struct Waiter {
    scheduler_id: Uuid,
    wait: Duration,
    shared: Arc<DebounceShared>,
    spawner: Arc<dyn Spawn>,
    context: ExecutionContext,
}

impl Waiter {
    fn run(self) {
        let mut state = self.shared.state.lock();
        loop {
            if state.pending.is_none() {
                if state.shutdown {
                    break;
                }
                self.shared.wake.wait(&mut state);
                continue;
            }

            let deadline = state.last_submit + self.wait;
            if state.shutdown || state.flush_requested || Instant::now() >= deadline {
                // Capture and clear in one critical section, dispatch unlocked.
                let captured = state.pending.take();
                state.flush_requested = false;
                if let Some(task) = captured {
                    MutexGuard::unlocked(&mut state, || self.fire(task));
                }
                continue;
            }

            self.shared.wake.wait_until(&mut state, deadline);
        }
        debug!(scheduler_id = %self.scheduler_id, "debounce waiter exiting");
    }

    fn fire(&self, task: Task) {
        let task_id = task.id;
        // Counted before the handoff so a fast worker never runs ahead of it.
        self.shared.counters.fired.fetch_add(1, Ordering::Relaxed);
        debug!(scheduler_id = %self.scheduler_id, task_id, "debounce window fired");

        let context = self.context.clone();
        let dispatched = self.spawner.spawn(Box::new(move || {
            context.execute(task);
        }));
        if let Err(e) = dispatched {
            self.shared.counters.fired.fetch_sub(1, Ordering::Relaxed);
            warn!(
                scheduler_id = %self.scheduler_id,
                task_id,
                error = %e,
                "debounced action rejected"
            );
            self.context.report(task_id, TaskFailure::Rejected(e.to_string()));
        }
    }
}
