//! Worker pools, the factory that creates them, and load shedding.
//!
//! Each stage runs on its own pool so that a slow stage cannot starve the
//! others. When a pool is saturated it hands the refused task to its
//! [`RejectionHandler`] instead of blocking the submitter.

mod bounded;
mod shedding;

pub use bounded::BoundedWorkerPool;
pub use shedding::{LoadSheddingPolicy, RejectionHandler};

use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::errors::StageResult;
use crate::stage::RuntimeStage;
use crate::task::{StageTask, TaskHandle};

/// A bounded concurrent executor for stage tasks.
pub trait WorkerPool: Send + Sync {
    /// Submits a task without blocking.
    ///
    /// A task the pool cannot admit is passed to the rejection handler and
    /// the returned handle reports [`TaskStatus::Rejected`](crate::task::TaskStatus::Rejected).
    fn submit(&self, task: StageTask) -> TaskHandle;

    /// Cancels all queued and running tasks without waiting for them.
    ///
    /// Returns the number of tasks abandoned. Later calls return zero.
    fn shutdown_now(&self) -> usize;

    /// Returns true once `shutdown_now` was called.
    fn is_shutdown(&self) -> bool;

    /// Returns the number of admitted tasks that have not finished.
    fn in_flight(&self) -> usize;

    /// Replaces the handler invoked for refused submissions.
    fn set_rejection_handler(&self, handler: Arc<dyn RejectionHandler>);
}

/// Creates the worker pool for a stage.
#[cfg_attr(test, mockall::automock)]
pub trait WorkerPoolFactory: Send + Sync {
    /// Creates a pool scoped to `(dispatcher, stage)`.
    fn create(
        &self,
        dispatcher: &Arc<dyn Dispatcher>,
        stage: &Arc<RuntimeStage>,
    ) -> StageResult<Arc<dyn WorkerPool>>;
}

/// Builds a [`BoundedWorkerPool`] from the stage's pool configuration, with a
/// [`LoadSheddingPolicy`] for that stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWorkerPoolFactory;

impl WorkerPoolFactory for DefaultWorkerPoolFactory {
    fn create(
        &self,
        _dispatcher: &Arc<dyn Dispatcher>,
        stage: &Arc<RuntimeStage>,
    ) -> StageResult<Arc<dyn WorkerPool>> {
        let policy = Arc::new(LoadSheddingPolicy::new(stage.id()));
        let pool = BoundedWorkerPool::new(stage.id(), stage.pool_config().clone(), policy)?;
        Ok(Arc::new(pool))
    }
}
