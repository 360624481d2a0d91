//! Core scheduling abstractions and the dispatch policies.

pub mod batch;
pub mod debounce;
pub mod error;
pub mod immediate;
pub mod reporter;
pub mod scheduler;
pub mod task;
pub mod worker_pool;

pub use batch::{BatchQueue, BatchScheduler, BatchSnapshot};
pub use debounce::{DebounceScheduler, DebounceStats};
pub use error::{AppResult, SchedulerError};
pub use immediate::ImmediateScheduler;
pub use reporter::{FailureEvent, FailureReporter, InMemoryReporter, TaskFailure, TracingReporter};
pub use scheduler::{Policy, Scheduler, SchedulerExt};
pub use task::{Action, ExecutionMode, Task, TaskId};
pub use worker_pool::{Job, PoolStats, Spawn, WorkerPool};
