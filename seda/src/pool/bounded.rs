//! A worker pool with a dedicated runtime and bounded admission.

use dashmap::DashMap;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::{RejectionHandler, WorkerPool};
use crate::config::PoolConfig;
use crate::errors::{ConfigurationError, StageResult};
use crate::task::{StageTask, TaskHandle, TaskOutcome, TaskStatus};

/// Worker pool backed by its own multi-threaded tokio runtime.
///
/// At most `workers` tasks run at once and at most `workers + queue_capacity`
/// are admitted. Admitted tasks wait for a worker in submission order.
pub struct BoundedWorkerPool {
    stage_id: String,
    config: PoolConfig,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    tasks: Arc<DashMap<u64, TaskHandle>>,
    next_id: AtomicU64,
    /// Held for reading across admission and spawn; `shutdown_now` takes it
    /// for writing so no task is spawned onto a runtime being torn down.
    shutdown: RwLock<bool>,
    rejection: RwLock<Arc<dyn RejectionHandler>>,
}

impl BoundedWorkerPool {
    /// Creates a pool and starts its worker threads.
    pub fn new(
        stage_id: impl Into<String>,
        config: PoolConfig,
        rejection: Arc<dyn RejectionHandler>,
    ) -> StageResult<Self> {
        let stage_id = stage_id.into();
        if config.workers == 0 {
            return Err(ConfigurationError::InvalidWorkerCount { stage: stage_id }.into());
        }

        let prefix = config
            .thread_name_prefix
            .clone()
            .unwrap_or_else(|| stage_id.clone());
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.workers)
            .thread_name(format!("{prefix}-worker"))
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();

        let admission_limit = config.admission_limit().min(Semaphore::MAX_PERMITS);
        debug!(
            stage = %stage_id,
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "Worker pool created"
        );

        Ok(Self {
            admission: Arc::new(Semaphore::new(admission_limit)),
            workers: Arc::new(Semaphore::new(config.workers)),
            stage_id,
            config,
            runtime: Mutex::new(Some(runtime)),
            handle,
            tasks: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            shutdown: RwLock::new(false),
            rejection: RwLock::new(rejection),
        })
    }

    /// Returns the pool configuration.
    #[must_use]
    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the number of tasks currently running on a worker.
    #[must_use]
    pub fn running(&self) -> usize {
        self.tasks
            .iter()
            .filter(|entry| entry.value().status() == TaskStatus::Running)
            .count()
    }

    fn reject(&self, task: &StageTask) -> TaskHandle {
        let handler = Arc::clone(&*self.rejection.read());
        handler.rejected(task, self);
        TaskHandle::rejected(task.event_id())
    }
}

/// Removes a task from the pool's registry when its future is dropped,
/// whether it finished, was aborted, or was discarded by runtime shutdown.
struct TaskGuard {
    id: u64,
    tasks: Arc<DashMap<u64, TaskHandle>>,
    handle: TaskHandle,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.tasks.remove(&self.id);
        self.handle.finish(TaskStatus::Cancelled);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

impl WorkerPool for BoundedWorkerPool {
    fn submit(&self, task: StageTask) -> TaskHandle {
        let closed = self.shutdown.read();
        if *closed {
            drop(closed);
            return self.reject(&task);
        }
        let Ok(slot) = Arc::clone(&self.admission).try_acquire_owned() else {
            drop(closed);
            return self.reject(&task);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = TaskHandle::queued(task.event_id());
        self.tasks.insert(id, handle.clone());

        let guard = TaskGuard {
            id,
            tasks: Arc::clone(&self.tasks),
            handle: handle.clone(),
        };
        let workers = Arc::clone(&self.workers);
        let stage_id = self.stage_id.clone();
        let future = task.into_future();

        let join = self.handle.spawn(async move {
            let _slot = slot;
            let guard = guard;
            // Closed on shutdown; queued tasks then never start.
            let Ok(_worker) = workers.acquire_owned().await else {
                return;
            };
            if !guard.handle.begin() {
                return;
            }

            let status = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(TaskOutcome::Completed) => TaskStatus::Completed,
                Ok(TaskOutcome::Failed(_)) => TaskStatus::Failed,
                Err(panic) => {
                    error!(
                        stage = %stage_id,
                        event_id = %guard.handle.event_id(),
                        panic = %panic_message(&*panic),
                        "Stage task panicked"
                    );
                    TaskStatus::Failed
                }
            };
            guard.handle.finish(status);
        });
        handle.attach(join.abort_handle());
        drop(closed);

        handle
    }

    fn shutdown_now(&self) -> usize {
        {
            let mut closed = self.shutdown.write();
            if *closed {
                return 0;
            }
            *closed = true;
        }
        self.admission.close();
        self.workers.close();

        let pending: Vec<TaskHandle> = self
            .tasks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let abandoned = pending.iter().filter(|handle| handle.cancel()).count();

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        debug!(stage = %self.stage_id, abandoned, "Worker pool shut down");

        abandoned
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.read()
    }

    fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    fn set_rejection_handler(&self, handler: Arc<dyn RejectionHandler>) {
        *self.rejection.write() = handler;
    }
}

impl Drop for BoundedWorkerPool {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside async contexts.
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for BoundedWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedWorkerPool")
            .field("stage_id", &self.stage_id)
            .field("config", &self.config)
            .field("in_flight", &self.in_flight())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
