//! Runtime adapters and the scheduled correction loops.

pub mod scheduler;
pub mod tokio_spawner;

use std::future::Future;

pub use scheduler::{Scheduler, SchedulerHandle};
pub use tokio_spawner::TokioSpawner;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Run the future to completion as a background task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
