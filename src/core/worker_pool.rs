//! Background execution facility: dedicated OS worker threads fed by a channel.
//!
//! Schedulers hand finished dispatch decisions to a [`Spawn`] implementation.
//! [`WorkerPool`] is the default; [`TokioSpawner`](crate::runtime::TokioSpawner)
//! runs the same jobs on a Tokio blocking pool instead.
//!
//! # Design Principles
//!
//! - **No polling**: workers block on `recv`; shutdown drops the sender
//! - **Never blocks the submitter**: the job channel is unbounded
//! - **Survives panics**: every job runs under `catch_unwind`

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::error::SchedulerError;
use super::task::panic_message;
use crate::config::WorkerPoolConfig;

/// A type-erased job handed to an execution facility.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Abstraction for running jobs off the calling thread.
pub trait Spawn: Send + Sync {
    /// Start running `job` in the background.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Shutdown`] if the facility no longer accepts
    /// work. The job is dropped without running in that case.
    fn spawn(&self, job: Job) -> Result<(), SchedulerError>;
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Currently executing jobs.
    pub active_jobs: u64,
    /// Jobs waiting for a free worker.
    pub queued_jobs: u64,
    /// Total jobs accepted.
    pub submitted_jobs: u64,
    /// Total jobs finished, including panicked ones.
    pub completed_jobs: u64,
    /// Jobs that panicked inside the worker.
    pub panicked_jobs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
struct PoolCounters {
    active_jobs: AtomicU64,
    queued_jobs: AtomicU64,
    submitted_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    panicked_jobs: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_jobs: self.active_jobs.load(Ordering::Relaxed),
            queued_jobs: self.queued_jobs.load(Ordering::Relaxed),
            submitted_jobs: self.submitted_jobs.load(Ordering::Relaxed),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
            panicked_jobs: self.panicked_jobs.load(Ordering::Relaxed),
        }
    }
}

/// Worker pool with dedicated OS threads.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    /// Job sender. `None` once shut down.
    job_tx: Mutex<Option<Sender<Job>>>,
    counters: Arc<PoolCounters>,
    shutdown: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool and spawn `config.worker_count` threads.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] for an invalid configuration
    /// and [`SchedulerError::WorkerSpawn`] if a thread cannot be started.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (job_tx, job_rx) = unbounded::<Job>();
        let counters = Arc::new(PoolCounters::default());

        let mut workers = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let spawned = spawn_worker(worker_id, &config, job_rx.clone(), Arc::clone(&counters));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Dropping the sender lets already-started workers exit.
                    drop(job_tx);
                    error!(worker_id, error = %e, "failed to spawn worker thread");
                    return Err(SchedulerError::WorkerSpawn(e));
                }
            }
        }

        debug!(
            worker_count = config.worker_count,
            prefix = %config.thread_name_prefix,
            "worker pool initialized"
        );

        Ok(Self {
            config,
            job_tx: Mutex::new(Some(job_tx)),
            counters,
            shutdown: AtomicBool::new(false),
            workers: Mutex::new(workers),
        })
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Shut down the pool gracefully.
    ///
    /// Drops the job sender so idle workers exit once the channel drains, then
    /// joins each worker with a 2 second timeout. Workers that do not exit in
    /// time are detached.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("shutting down worker pool");
        self.job_tx.lock().take();

        let mut workers = self.workers.lock();
        let worker_count = workers.len();

        for (idx, worker) in workers.drain(..).enumerate() {
            if worker.thread().id() == thread::current().id() {
                // Shutdown from inside a job; joining ourselves would deadlock.
                continue;
            }
            let (tx, rx) = crossbeam_channel::bounded(1);
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });

            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => debug!(worker_id = idx, "worker joined"),
                Ok(false) => warn!(worker_id = idx, "worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }

        info!(worker_count, "worker pool shut down complete");
    }
}

impl Spawn for WorkerPool {
    fn spawn(&self, job: Job) -> Result<(), SchedulerError> {
        let job_tx = self.job_tx.lock();
        let Some(tx) = job_tx.as_ref() else {
            return Err(SchedulerError::Shutdown);
        };
        // Count first so a fast worker never observes a negative queue.
        self.counters.queued_jobs.fetch_add(1, Ordering::Relaxed);
        if tx.send(job).is_err() {
            self.counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
            return Err(SchedulerError::Shutdown);
        }
        self.counters.submitted_jobs.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Don't join here: a job may still be running. Workers finish the
        // queued jobs and exit once the sender is gone.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.job_tx.lock().take();
            debug!("worker pool dropped without explicit shutdown - workers detached");
        }
    }
}

fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    job_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            // Exits when every sender is dropped and the channel is drained.
            while let Ok(job) = job_rx.recv() {
                counters.queued_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.active_jobs.fetch_add(1, Ordering::Relaxed);

                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    counters.panicked_jobs.fetch_add(1, Ordering::Relaxed);
                    error!(
                        worker_id,
                        panic = %panic_message(payload.as_ref()),
                        "job panicked in worker"
                    );
                }

                counters.active_jobs.fetch_sub(1, Ordering::Relaxed);
                counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }

            debug!(worker_id, "worker thread exiting");
        })
}
