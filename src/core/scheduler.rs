//! The scheduling capability shared by every dispatch policy.

use std::sync::Arc;

use uuid::Uuid;

use super::error::{AppResult, SchedulerError};
use super::task::{Action, ExecutionMode};
use crate::config::{BatchConfig, DebounceConfig, SchedulerConfig};

/// Descriptor of a scheduler's concrete policy and the settings it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// [`ImmediateScheduler`](crate::core::ImmediateScheduler).
    Immediate,
    /// [`BatchScheduler`](crate::core::BatchScheduler).
    Batch(BatchConfig),
    /// [`DebounceScheduler`](crate::core::DebounceScheduler).
    Debounce(DebounceConfig),
    /// A policy implemented outside this crate; the factory cannot reproduce it.
    Custom(String),
}

impl Policy {
    /// Short policy label.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Immediate => "immediate",
            Self::Batch(_) => "batch",
            Self::Debounce(_) => "debounce",
            Self::Custom(name) => name,
        }
    }

    /// Convert into a buildable configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnrecognizedPolicy`] for [`Policy::Custom`].
    pub fn into_config(self) -> Result<SchedulerConfig, SchedulerError> {
        match self {
            Self::Immediate => Ok(SchedulerConfig::Immediate),
            Self::Batch(cfg) => Ok(SchedulerConfig::Batch(cfg)),
            Self::Debounce(cfg) => Ok(SchedulerConfig::Debounce(cfg)),
            Self::Custom(name) => Err(SchedulerError::UnrecognizedPolicy(name)),
        }
    }
}

impl From<SchedulerConfig> for Policy {
    fn from(cfg: SchedulerConfig) -> Self {
        match cfg {
            SchedulerConfig::Immediate => Self::Immediate,
            SchedulerConfig::Batch(cfg) => Self::Batch(cfg),
            SchedulerConfig::Debounce(cfg) => Self::Debounce(cfg),
        }
    }
}

/// Accepts work from callers and runs it under some policy.
///
/// Callers hold an `Arc<dyn Scheduler>` and never depend on a concrete
/// policy, so the same call sites run against [`ImmediateScheduler`] in tests
/// and [`BatchScheduler`] in production.
///
/// [`ImmediateScheduler`]: crate::core::ImmediateScheduler
/// [`BatchScheduler`]: crate::core::BatchScheduler
pub trait Scheduler: Send + Sync {
    /// Submit an action.
    ///
    /// Never waits for the action to finish and never fails; action failures
    /// go to the scheduler's failure reporter.
    fn submit(&self, action: Action, mode: ExecutionMode);

    /// The concrete policy of this instance.
    fn policy(&self) -> Policy;

    /// Instance identifier, used in logs and failure events.
    fn id(&self) -> Uuid;
}

/// Closure-friendly submission helpers, available on every scheduler.
pub trait SchedulerExt: Scheduler {
    /// Submit a closure that must run alone.
    fn submit_serial<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(
            Box::new(move || {
                f();
                Ok(())
            }),
            ExecutionMode::Serial,
        );
    }

    /// Submit a closure that may run alongside other parallel work.
    fn submit_parallel<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(
            Box::new(move || {
                f();
                Ok(())
            }),
            ExecutionMode::Parallel,
        );
    }

    /// Submit a fallible closure; an `Err` is reported like a panic.
    fn submit_fallible<F>(&self, f: F, mode: ExecutionMode)
    where
        F: FnOnce() -> AppResult<()> + Send + 'static,
    {
        self.submit(Box::new(f), mode);
    }
}

impl<S: Scheduler + ?Sized> SchedulerExt for S {}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn submit(&self, action: Action, mode: ExecutionMode) {
        (**self).submit(action, mode);
    }

    fn policy(&self) -> Policy {
        (**self).policy()
    }

    fn id(&self) -> Uuid {
        (**self).id()
    }
}
