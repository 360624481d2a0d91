//! Runtime adapters for executing scheduled work.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
