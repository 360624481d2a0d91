//! Scheduler and worker pool configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default stack size for worker threads (2 MiB).
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Settings for the background threads that execute dispatched tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
    /// Worker threads are named `<prefix>-<index>`.
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            thread_stack_size: DEFAULT_STACK_SIZE,
            thread_name_prefix: "dispatch-worker".into(),
        }
    }
}

impl WorkerPoolConfig {
    /// Configuration with one worker per logical CPU.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with a single worker thread.
    #[must_use]
    pub fn single() -> Self {
        Self::default().with_worker_count(1)
    }

    /// Set the number of worker threads.
    #[must_use]
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate worker pool values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.thread_name_prefix.is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }
}

/// Batch scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Pool running dispatched tasks.
    pub workers: WorkerPoolConfig,
}

impl BatchConfig {
    /// Use the given worker pool settings.
    #[must_use]
    pub fn with_workers(mut self, workers: WorkerPoolConfig) -> Self {
        self.workers = workers;
        self
    }
}

/// Debounce scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet period in milliseconds before the latest action fires; 0 fires immediately.
    pub wait_ms: u64,
    /// Pool running fired actions.
    pub workers: WorkerPoolConfig,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            wait_ms: 0,
            workers: WorkerPoolConfig::single().with_thread_name_prefix("debounce-worker"),
        }
    }
}

impl DebounceConfig {
    /// Set the quiet period, rounded up to whole milliseconds.
    ///
    /// A non-zero sub-millisecond wait becomes 1 ms, never 0.
    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        let millis = wait.as_nanos().div_ceil(1_000_000);
        self.wait_ms = u64::try_from(millis).unwrap_or(u64::MAX);
        self
    }

    /// Use the given worker pool settings.
    #[must_use]
    pub fn with_workers(mut self, workers: WorkerPoolConfig) -> Self {
        self.workers = workers;
        self
    }

    /// Quiet period as a duration.
    #[must_use]
    pub const fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

/// Which policy to build, with its settings.
///
/// Passed explicitly to constructors and the factory; there is no global
/// settings instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SchedulerConfig {
    /// Run actions synchronously on the caller.
    Immediate,
    /// FIFO batching of parallel runs with exclusive serial tasks.
    Batch(BatchConfig),
    /// Coalesce bursts into one delayed execution of the latest action.
    Debounce(DebounceConfig),
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::Batch(BatchConfig::default())
    }
}

impl SchedulerConfig {
    /// Short policy label used in logs and failure events.
    #[must_use]
    pub const fn policy_name(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Batch(_) => "batch",
            Self::Debounce(_) => "debounce",
        }
    }

    /// Validate the selected policy's settings.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Immediate => Ok(()),
            Self::Batch(cfg) => cfg
                .workers
                .validate()
                .map_err(|e| format!("batch workers invalid: {e}")),
            Self::Debounce(cfg) => cfg
                .workers
                .validate()
                .map_err(|e| format!("debounce workers invalid: {e}")),
        }
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read configuration from the process environment, loading `.env` first.
    ///
    /// Recognized variables: `DISPATCH_POLICY` (`immediate`, `batch`,
    /// `debounce`; default `batch`), `DISPATCH_WORKERS` and
    /// `DISPATCH_DEBOUNCE_MS`.
    ///
    /// # Errors
    ///
    /// Returns a message when a variable cannot be parsed or validation fails.
    pub fn from_env() -> Result<Self, String> {
        // Missing .env is the common case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns a message when a value cannot be parsed or validation fails.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workers = lookup("DISPATCH_WORKERS")
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .map_err(|e| format!("DISPATCH_WORKERS: {e}"))
            })
            .transpose()?;

        let policy = lookup("DISPATCH_POLICY").unwrap_or_else(|| "batch".into());
        let cfg = match policy.trim().to_ascii_lowercase().as_str() {
            "immediate" => Self::Immediate,
            "batch" => {
                let mut cfg = BatchConfig::default();
                if let Some(n) = workers {
                    cfg.workers.worker_count = n;
                }
                Self::Batch(cfg)
            }
            "debounce" => {
                let mut cfg = DebounceConfig::default();
                if let Some(n) = workers {
                    cfg.workers.worker_count = n;
                }
                if let Some(ms) = lookup("DISPATCH_DEBOUNCE_MS") {
                    cfg.wait_ms = ms
                        .trim()
                        .parse()
                        .map_err(|e| format!("DISPATCH_DEBOUNCE_MS: {e}"))?;
                }
                Self::Debounce(cfg)
            }
            other => return Err(format!("DISPATCH_POLICY: unknown policy `{other}`")),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
