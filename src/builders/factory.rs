//! Build schedulers from configuration or from an existing instance.

use std::sync::Arc;

use tracing::debug;

use crate::config::SchedulerConfig;
use crate::core::{
    BatchScheduler, DebounceScheduler, FailureReporter, ImmediateScheduler, Scheduler,
    SchedulerError, TracingReporter,
};

/// Constructs schedulers, injecting the same failure reporter into each.
#[derive(Clone)]
pub struct SchedulerFactory {
    reporter: Arc<dyn FailureReporter>,
}

impl Default for SchedulerFactory {
    fn default() -> Self {
        Self::new(Arc::new(TracingReporter))
    }
}

impl SchedulerFactory {
    /// Factory whose schedulers report failures to `reporter`.
    #[must_use]
    pub fn new(reporter: Arc<dyn FailureReporter>) -> Self {
        Self { reporter }
    }

    /// Build a scheduler for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfig`] if validation fails, or a
    /// spawn error if background threads cannot be started.
    pub fn build(&self, cfg: &SchedulerConfig) -> Result<Arc<dyn Scheduler>, SchedulerError> {
        cfg.validate().map_err(SchedulerError::InvalidConfig)?;

        let scheduler: Arc<dyn Scheduler> = match cfg {
            SchedulerConfig::Immediate => {
                Arc::new(ImmediateScheduler::new(Arc::clone(&self.reporter)))
            }
            SchedulerConfig::Batch(batch) => Arc::new(BatchScheduler::new(
                batch.clone(),
                Arc::clone(&self.reporter),
            )?),
            SchedulerConfig::Debounce(debounce) => Arc::new(DebounceScheduler::new(
                debounce.clone(),
                Arc::clone(&self.reporter),
            )?),
        };
        debug!(
            policy = cfg.policy_name(),
            scheduler_id = %scheduler.id(),
            "scheduler built"
        );
        Ok(scheduler)
    }

    /// Build a fresh scheduler with the same policy and settings as `existing`.
    ///
    /// The new instance shares no queue, timer or worker state with the
    /// original. Only the policy and its configuration are copied: the new
    /// scheduler reports failures to this factory's reporter and, for batch
    /// and debounce, runs on a fresh [`WorkerPool`](crate::core::WorkerPool)
    /// even if `existing` was built with a custom reporter or a
    /// `TokioSpawner`.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnrecognizedPolicy`] if `existing` uses a
    /// policy this crate does not implement.
    pub fn create_like(
        &self,
        existing: &dyn Scheduler,
    ) -> Result<Arc<dyn Scheduler>, SchedulerError> {
        let cfg = existing.policy().into_config()?;
        self.build(&cfg)
    }
}
