//! Configuration models for schedulers and their worker pools.

pub mod scheduler;

pub use scheduler::{BatchConfig, DebounceConfig, SchedulerConfig, WorkerPoolConfig};
