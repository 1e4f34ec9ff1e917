//! Stage controllers.
//!
//! A controller owns one stage's worker pool and timeout monitor. It wraps
//! each incoming [`Event`] into a [`StageTask`], submits it, and arms a
//! deferred cancellation when the event has a positive timeout.

mod lifecycle;
mod metrics;
mod thread_pool;

pub use lifecycle::LifecycleState;
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use thread_pool::{ShutdownReport, TaskCustomizer, ThreadPoolStageController};

use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::errors::StageResult;
use crate::event::Event;
use crate::stage::RuntimeStage;
use crate::task::{StageTask, TaskHandle};

/// The operations a dispatcher needs from a stage.
pub trait StageController: Send + Sync {
    /// Acquires the pool and, when a timeout is configured, the timeout monitor.
    fn start(&self) -> StageResult<()>;

    /// Forcibly shuts down the pool and timeout monitor. Idempotent.
    ///
    /// If a `start()` is still in progress the stop is recorded and the
    /// starting call tears its run down before returning; the report is then
    /// empty and the abandoned counts go to the stage metrics.
    fn stop(&self) -> ShutdownReport;

    /// Returns true between a successful `start()` and the next `stop()`.
    fn is_running(&self) -> bool;

    /// Submits an event without waiting for it to run.
    fn execute(&self, event: Event) -> StageResult<TaskHandle>;

    /// Returns the dispatcher.
    fn dispatcher(&self) -> Option<Arc<dyn Dispatcher>>;

    /// Sets the dispatcher used from the next `start()`.
    fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>);

    /// Sets the runtime stage used from the next `start()`.
    fn set_runtime_stage(&self, stage: RuntimeStage);
}

/// The identity task customizer.
#[must_use]
pub fn identity_customizer(_event: &Event, task: StageTask) -> Option<StageTask> {
    Some(task)
}
