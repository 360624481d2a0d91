//! # Prometheus Dispatch
//!
//! In-process task scheduling for the Prometheus spectrum viewer.
//!
//! UI event handlers constantly need to move work off the calling thread:
//! re-rendering a chromatogram, recomputing an annotation layer, reloading a
//! scan after the user drags a slider. This crate provides a single injectable
//! capability for that, [`core::Scheduler`], and three policies behind it.
//!
//! ## Policies
//!
//! - **`BatchScheduler`**: FIFO queue where a contiguous run of parallel tasks
//!   executes concurrently and a serial task always runs alone. New work is
//!   only started once everything running has finished.
//! - **`DebounceScheduler`**: a burst of submissions collapses into one
//!   execution of the latest action, after the burst has been quiet for the
//!   configured wait.
//! - **`ImmediateScheduler`**: runs the action on the caller before `submit`
//!   returns; for deterministic tests.
//!
//! `SchedulerFactory` builds any of them from a [`config::SchedulerConfig`],
//! or a fresh instance matching an existing scheduler's policy.
//!
//! ## Failures
//!
//! `submit` never fails. A panicking or erroring action is caught on the
//! worker, turned into a [`core::FailureEvent`] and handed to the injected
//! [`core::FailureReporter`]. The batch scheduler releases the task's running
//! slot on every exit path, so a failing action never stalls the queue.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_dispatch::builders::SchedulerFactory;
//! use prometheus_dispatch::config::SchedulerConfig;
//! use prometheus_dispatch::core::{InMemoryReporter, SchedulerExt};
//!
//! let reporter = Arc::new(InMemoryReporter::default());
//! let factory = SchedulerFactory::new(reporter.clone());
//! let scheduler = factory.build(&SchedulerConfig::from_env()?)?;
//!
//! scheduler.submit_parallel(|| render_spectrum(17));
//! scheduler.submit_parallel(|| render_spectrum(18));
//! scheduler.submit_serial(|| save_annotations());
//!
//! // An independent scheduler with the same policy for a child view.
//! let child = factory.create_like(scheduler.as_ref())?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions and the dispatch policies.
pub mod core;
/// Configuration models for schedulers and worker pools.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Runtime adapters for executing scheduled work.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;
