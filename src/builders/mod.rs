//! Builders to construct schedulers from configuration.

pub mod factory;

pub use factory::SchedulerFactory;
