//! A stage controller backed by a dedicated worker pool.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::lifecycle::{AtomicLifecycle, LifecycleState};
use super::{identity_customizer, StageController, StageMetrics};
use crate::config::ControllerConfig;
use crate::dispatcher::Dispatcher;
use crate::errors::{ConfigurationError, StageError, StageResult};
use crate::event::Event;
use crate::pool::{DefaultWorkerPoolFactory, WorkerPool, WorkerPoolFactory};
use crate::stage::RuntimeStage;
use crate::task::{StageTask, TaskHandle, TaskStatus};
use crate::timeout::{effective_timeout_ms, TimeoutMonitor};

/// Hook that may wrap or replace the task built for each event.
///
/// Returning `None` is a contract violation reported as
/// [`StageError::EmptyTask`].
pub type TaskCustomizer = Arc<dyn Fn(&Event, StageTask) -> Option<StageTask> + Send + Sync>;

/// What `stop()` had to abandon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Queued or running tasks cancelled by the pool shutdown.
    pub pool_abandoned: usize,
    /// Pending timers discarded, or `None` if no timeout monitor was running.
    pub timers_abandoned: Option<usize>,
}

/// Resources held for one start/stop cycle.
struct ActiveRun {
    dispatcher: Arc<dyn Dispatcher>,
    stage: Arc<RuntimeStage>,
    pool: Arc<dyn WorkerPool>,
    timeout_monitor: Option<Arc<TimeoutMonitor>>,
    timeout_ms: u64,
}

/// Runs a stage's events on a pool obtained from a [`WorkerPoolFactory`],
/// cancelling those that outlive their timeout.
///
/// # Example
///
/// ```rust,ignore
/// let controller = ThreadPoolStageController::new()
///     .with_dispatcher(Arc::new(NoOpDispatcher))
///     .with_runtime_stage(RuntimeStage::new("parse", handler))
///     .with_timeout(500);
/// controller.start()?;
/// let handle = controller.execute(Event::new("parse", message))?;
/// ```
pub struct ThreadPoolStageController {
    state: AtomicLifecycle,
    dispatcher: RwLock<Option<Arc<dyn Dispatcher>>>,
    stage: RwLock<Option<Arc<RuntimeStage>>>,
    pool_factory: RwLock<Option<Arc<dyn WorkerPoolFactory>>>,
    customizer: RwLock<TaskCustomizer>,
    timeout_ms: AtomicU64,
    timeout_monitor_threads: AtomicUsize,
    run: RwLock<Option<ActiveRun>>,
    metrics: Arc<StageMetrics>,
}

impl ThreadPoolStageController {
    /// Creates a stopped controller with the default pool factory, no
    /// timeout, and one timeout monitor thread.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&ControllerConfig::default())
    }

    /// Creates a stopped controller from a configuration.
    #[must_use]
    pub fn from_config(config: &ControllerConfig) -> Self {
        Self {
            state: AtomicLifecycle::new(),
            dispatcher: RwLock::new(None),
            stage: RwLock::new(None),
            pool_factory: RwLock::new(Some(Arc::new(DefaultWorkerPoolFactory))),
            customizer: RwLock::new(Arc::new(identity_customizer)),
            timeout_ms: AtomicU64::new(config.timeout_ms),
            timeout_monitor_threads: AtomicUsize::new(config.timeout_monitor_threads),
            run: RwLock::new(None),
            metrics: Arc::new(StageMetrics::default()),
        }
    }

    /// Sets the dispatcher.
    #[must_use]
    pub fn with_dispatcher(self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.set_dispatcher(dispatcher);
        self
    }

    /// Sets the runtime stage.
    #[must_use]
    pub fn with_runtime_stage(self, stage: RuntimeStage) -> Self {
        self.set_runtime_stage(stage);
        self
    }

    /// Sets the default timeout in milliseconds.
    #[must_use]
    pub fn with_timeout(self, timeout_ms: u64) -> Self {
        self.set_timeout(timeout_ms);
        self
    }

    /// Sets the pool factory.
    #[must_use]
    pub fn with_pool_factory(self, factory: Arc<dyn WorkerPoolFactory>) -> Self {
        self.set_pool_factory(factory);
        self
    }

    /// Sets the task customizer.
    #[must_use]
    pub fn with_customizer<F>(self, customizer: F) -> Self
    where
        F: Fn(&Event, StageTask) -> Option<StageTask> + Send + Sync + 'static,
    {
        self.set_customizer(customizer);
        self
    }

    /// Sets the default timeout in milliseconds. Zero disables it.
    /// Takes effect at the next `start()`.
    pub fn set_timeout(&self, timeout_ms: u64) {
        self.timeout_ms.store(timeout_ms, Ordering::SeqCst);
    }

    /// Returns the configured default timeout in milliseconds.
    #[must_use]
    pub fn timeout(&self) -> u64 {
        self.timeout_ms.load(Ordering::SeqCst)
    }

    /// Sets the number of timeout monitor threads. Takes effect at the next
    /// `start()`.
    pub fn set_timeout_monitor_thread_count(&self, threads: usize) {
        self.timeout_monitor_threads.store(threads, Ordering::SeqCst);
    }

    /// Returns the pool factory.
    #[must_use]
    pub fn pool_factory(&self) -> Option<Arc<dyn WorkerPoolFactory>> {
        self.pool_factory.read().clone()
    }

    /// Sets the pool factory.
    pub fn set_pool_factory(&self, factory: Arc<dyn WorkerPoolFactory>) {
        *self.pool_factory.write() = Some(factory);
    }

    /// Removes the pool factory; `start()` then fails until one is set.
    pub fn clear_pool_factory(&self) {
        *self.pool_factory.write() = None;
    }

    /// Sets the hook applied to every task before submission.
    pub fn set_customizer<F>(&self, customizer: F)
    where
        F: Fn(&Event, StageTask) -> Option<StageTask> + Send + Sync + 'static,
    {
        *self.customizer.write() = Arc::new(customizer);
    }

    /// Returns the runtime stage.
    #[must_use]
    pub fn runtime_stage(&self) -> Option<Arc<RuntimeStage>> {
        self.stage.read().clone()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.state.load()
    }

    /// Returns the stage counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<StageMetrics> {
        &self.metrics
    }

    /// Returns the timeout monitor of the current run, if any.
    #[must_use]
    pub fn timeout_monitor(&self) -> Option<Arc<TimeoutMonitor>> {
        self.run
            .read()
            .as_ref()
            .and_then(|run| run.timeout_monitor.clone())
    }

    /// Returns the timeout snapshot taken by the current run.
    #[must_use]
    pub fn active_timeout(&self) -> Option<u64> {
        self.run.read().as_ref().map(|run| run.timeout_ms)
    }

    fn stage_label(&self) -> String {
        self.stage
            .read()
            .as_ref()
            .map_or_else(|| "<unset>".to_string(), |stage| stage.id().to_string())
    }

    fn launch(&self) -> StageResult<ActiveRun> {
        let dispatcher = self
            .dispatcher
            .read()
            .clone()
            .ok_or(ConfigurationError::MissingDispatcher)?;
        let stage = self
            .stage
            .read()
            .clone()
            .ok_or(ConfigurationError::MissingRuntimeStage)?;
        let factory = self
            .pool_factory
            .read()
            .clone()
            .ok_or(ConfigurationError::MissingPoolFactory)?;
        let threads = self.timeout_monitor_threads.load(Ordering::SeqCst);
        if threads == 0 {
            return Err(ConfigurationError::InvalidTimeoutMonitorThreads(threads).into());
        }

        let pool = factory.create(&dispatcher, &stage)?;

        let timeout_ms = self.timeout_ms.load(Ordering::SeqCst);
        let timeout_monitor = if timeout_ms > 0 {
            match TimeoutMonitor::new(stage.id(), threads, Arc::clone(&self.metrics)) {
                Ok(monitor) => Some(Arc::new(monitor)),
                Err(e) => {
                    pool.shutdown_now();
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(ActiveRun {
            dispatcher,
            stage,
            pool,
            timeout_monitor,
            timeout_ms,
        })
    }

    /// Force-stops the current run, if any, and records what it abandoned.
    fn teardown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        let run = self.run.write().take();
        if let Some(run) = run {
            let stage_id = run.stage.id();

            match std::panic::catch_unwind(AssertUnwindSafe(|| run.pool.shutdown_now())) {
                Ok(remaining) => report.pool_abandoned = remaining,
                Err(_) => error!(stage = %stage_id, "Worker pool shutdown panicked"),
            }
            info!(
                stage = %stage_id,
                remaining = report.pool_abandoned,
                "Shutdown processed for stage"
            );

            if let Some(monitor) = run.timeout_monitor.as_ref() {
                let remaining = monitor.shutdown_now();
                report.timers_abandoned = Some(remaining);
                info!(
                    stage = %stage_id,
                    remaining,
                    "Shutdown processed for timeout monitor"
                );
            }
        }

        self.metrics.record_abandoned(report.pool_abandoned);
        report
    }
}

impl Default for ThreadPoolStageController {
    fn default() -> Self {
        Self::new()
    }
}

impl StageController for ThreadPoolStageController {
    fn start(&self) -> StageResult<()> {
        if let Err(state) = self
            .state
            .transition(LifecycleState::Stopped, LifecycleState::Starting)
        {
            debug!(stage = %self.stage_label(), %state, "Start rejected");
            return Err(StageError::AlreadyRunning {
                stage: self.stage_label(),
            });
        }

        match self.launch() {
            Ok(run) => {
                let stage_id = run.stage.id().to_string();
                info!(
                    stage = %stage_id,
                    dispatcher = %run.dispatcher.name(),
                    timeout_ms = run.timeout_ms,
                    timeout_monitor = run.timeout_monitor.is_some(),
                    "Stage started"
                );
                *self.run.write() = Some(run);

                if self
                    .state
                    .transition(LifecycleState::Starting, LifecycleState::Running)
                    .is_err()
                {
                    info!(stage = %stage_id, "Stop requested during start");
                    self.teardown();
                    self.state.store(LifecycleState::Stopped);
                }
                Ok(())
            }
            Err(e) => {
                self.state.store(LifecycleState::Stopped);
                error!(stage = %self.stage_label(), error = %e, "Stage failed to start");
                Err(e)
            }
        }
    }

    fn stop(&self) -> ShutdownReport {
        loop {
            match self
                .state
                .transition(LifecycleState::Running, LifecycleState::Stopping)
            {
                Ok(()) => break,
                // start() sees StopPending and tears its run down itself.
                Err(LifecycleState::Starting) => {
                    if self
                        .state
                        .transition(LifecycleState::Starting, LifecycleState::StopPending)
                        .is_ok()
                    {
                        debug!(stage = %self.stage_label(), "Stop deferred until start completes");
                        return ShutdownReport::default();
                    }
                }
                Err(state) => {
                    debug!(stage = %self.stage_label(), %state, "Stop ignored");
                    return ShutdownReport::default();
                }
            }
        }

        let report = self.teardown();
        self.state.store(LifecycleState::Stopped);
        report
    }

    fn is_running(&self) -> bool {
        self.state.load() == LifecycleState::Running
    }

    fn execute(&self, event: Event) -> StageResult<TaskHandle> {
        let (dispatcher, stage, pool, monitor, active_timeout) = {
            let run = self.run.read();
            match run.as_ref() {
                Some(run) if self.is_running() => (
                    Arc::clone(&run.dispatcher),
                    Arc::clone(&run.stage),
                    Arc::clone(&run.pool),
                    run.timeout_monitor.clone(),
                    run.timeout_ms,
                ),
                _ => {
                    return Err(StageError::NotRunning {
                        stage: self.stage_label(),
                    })
                }
            }
        };

        let customizer = Arc::clone(&*self.customizer.read());
        let task = StageTask::new(dispatcher, Arc::clone(&stage), event.clone());
        let task = customizer(&event, task).ok_or_else(|| StageError::EmptyTask {
            stage: stage.id().to_string(),
        })?;

        self.metrics.record_submitted();
        let handle = pool.submit(task);
        if handle.status() == TaskStatus::Rejected {
            self.metrics.record_rejected();
            return Ok(handle);
        }

        if let Some(monitor) = monitor {
            let timeout_ms = effective_timeout_ms(event.message().as_ref(), active_timeout);
            if timeout_ms > 0 && !handle.is_finished() {
                monitor.schedule(&handle, event.id(), Duration::from_millis(timeout_ms));
            }
        }

        Ok(handle)
    }

    fn dispatcher(&self) -> Option<Arc<dyn Dispatcher>> {
        self.dispatcher.read().clone()
    }

    fn set_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>) {
        *self.dispatcher.write() = Some(dispatcher);
    }

    fn set_runtime_stage(&self, stage: RuntimeStage) {
        *self.stage.write() = Some(Arc::new(stage));
    }
}

impl Drop for ThreadPoolStageController {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for ThreadPoolStageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolStageController")
            .field("stage", &self.stage_label())
            .field("state", &self.lifecycle_state())
            .field("timeout_ms", &self.timeout())
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::dispatcher::NoOpDispatcher;
    use crate::event::{Payload, TimedPayload};
    use crate::pool::{MockWorkerPoolFactory, WorkerPoolFactory};
    use crate::testing::{RecordingHandler, SleepingHandler};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    fn stage(handler: Arc<dyn crate::handler::EventHandler>) -> RuntimeStage {
        RuntimeStage::new("parse", handler).with_pool_config(PoolConfig::new(2, 8))
    }

    fn controller(handler: Arc<dyn crate::handler::EventHandler>) -> ThreadPoolStageController {
        ThreadPoolStageController::new()
            .with_dispatcher(Arc::new(NoOpDispatcher))
            .with_runtime_stage(stage(handler))
    }

    fn event() -> Event {
        Event::new("parse", Arc::new(Payload::new(serde_json::json!({"n": 1}))))
    }

    #[test]
    fn test_is_running_across_lifecycle() {
        let controller = controller(Arc::new(RecordingHandler::new()));
        assert!(!controller.is_running());
        assert_eq!(controller.lifecycle_state(), LifecycleState::Stopped);

        assert_ok!(controller.start());
        assert!(controller.is_running());

        controller.stop();
        assert!(!controller.is_running());
        assert_eq!(controller.lifecycle_state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_start_requires_stage() {
        let controller = ThreadPoolStageController::new().with_dispatcher(Arc::new(NoOpDispatcher));
        let err = assert_err!(controller.start());
        assert!(matches!(
            err,
            StageError::Configuration(ConfigurationError::MissingRuntimeStage)
        ));
        assert!(!controller.is_running());
        assert!(matches!(
            controller.execute(event()),
            Err(StageError::NotRunning { .. })
        ));
    }

    #[test]
    fn test_start_requires_dispatcher() {
        let controller = ThreadPoolStageController::new()
            .with_runtime_stage(stage(Arc::new(RecordingHandler::new())));
        let err = assert_err!(controller.start());
        assert!(matches!(
            err,
            StageError::Configuration(ConfigurationError::MissingDispatcher)
        ));
    }

    #[test]
    fn test_start_requires_pool_factory() {
        let controller = controller(Arc::new(RecordingHandler::new()));
        controller.clear_pool_factory();
        let err = assert_err!(controller.start());
        assert!(matches!(
            err,
            StageError::Configuration(ConfigurationError::MissingPoolFactory)
        ));
    }

    #[test]
    fn test_start_requires_monitor_threads() {
        let controller = controller(Arc::new(RecordingHandler::new()));
        controller.set_timeout_monitor_thread_count(0);
        let err = assert_err!(controller.start());
        assert!(matches!(
            err,
            StageError::Configuration(ConfigurationError::InvalidTimeoutMonitorThreads(0))
        ));
        assert_eq!(controller.lifecycle_state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_second_start_rejected() {
        let controller = controller(Arc::new(RecordingHandler::new()));
        assert_ok!(controller.start());
        assert!(matches!(
            controller.start(),
            Err(StageError::AlreadyRunning { .. })
        ));
        assert!(controller.is_running());
        controller.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let controller = controller(Arc::new(RecordingHandler::new()));
        assert_eq!(controller.stop(), ShutdownReport::default());

        assert_ok!(controller.start());
        controller.stop();
        assert_eq!(controller.stop(), ShutdownReport::default());
    }

    #[test]
    fn test_no_monitor_when_timeout_disabled() {
        let controller = controller(Arc::new(RecordingHandler::new()));
        assert_ok!(controller.start());
        assert!(controller.timeout_monitor().is_none());
        assert_eq!(controller.active_timeout(), Some(0));

        let report = controller.stop();
        assert_eq!(report.timers_abandoned, None);
    }

    #[test]
    fn test_timeout_snapshot_taken_at_start() {
        let controller = controller(Arc::new(RecordingHandler::new())).with_timeout(50);
        assert_ok!(controller.start());
        controller.set_timeout(0);

        assert_eq!(controller.active_timeout(), Some(50));
        assert!(controller.timeout_monitor().is_some());
        controller.stop();
    }

    #[test]
    fn test_restart_replaces_monitor() {
        let controller = controller(Arc::new(RecordingHandler::new())).with_timeout(100);
        assert_ok!(controller.start());
        let first = controller.timeout_monitor().unwrap();

        controller.stop();
        assert!(first.is_shutdown());

        assert_ok!(controller.start());
        assert!(controller.is_running());
        let second = controller.timeout_monitor().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_shutdown());
        controller.stop();
    }

    #[test]
    fn test_factory_called_once_per_start() {
        let mut factory = MockWorkerPoolFactory::new();
        factory
            .expect_create()
            .times(2)
            .returning(|dispatcher, stage| DefaultWorkerPoolFactory.create(dispatcher, stage));

        let controller = controller(Arc::new(RecordingHandler::new()))
            .with_pool_factory(Arc::new(factory));
        assert_ok!(controller.start());
        controller.stop();
        assert_ok!(controller.start());
        controller.stop();
    }

    #[test]
    fn test_factory_error_leaves_controller_stopped() {
        let mut factory = MockWorkerPoolFactory::new();
        factory.expect_create().times(1).returning(|_, stage| {
            Err(ConfigurationError::InvalidWorkerCount {
                stage: stage.id().to_string(),
            }
            .into())
        });

        let controller = controller(Arc::new(RecordingHandler::new()))
            .with_pool_factory(Arc::new(factory));
        assert!(assert_err!(controller.start()).is_configuration());
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_during_slow_start_tears_run_down() {
        let created: Arc<Mutex<Option<Arc<dyn WorkerPool>>>> = Arc::default();
        let created_clone = created.clone();
        let mut factory = MockWorkerPoolFactory::new();
        factory.expect_create().times(1).returning(move |dispatcher, stage| {
            std::thread::sleep(Duration::from_millis(200));
            let pool = DefaultWorkerPoolFactory.create(dispatcher, stage)?;
            *created_clone.lock() = Some(Arc::clone(&pool));
            Ok(pool)
        });

        let controller = Arc::new(
            controller(Arc::new(RecordingHandler::new()))
                .with_timeout(1_000)
                .with_pool_factory(Arc::new(factory)),
        );
        let starter = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || controller.start())
        };
        while controller.lifecycle_state() != LifecycleState::Starting {
            std::thread::yield_now();
        }

        assert_eq!(controller.stop(), ShutdownReport::default());
        assert!(!controller.is_running());
        assert_eq!(controller.lifecycle_state(), LifecycleState::StopPending);
        assert_eq!(controller.stop(), ShutdownReport::default());
        assert!(matches!(
            controller.start(),
            Err(StageError::AlreadyRunning { .. })
        ));

        assert_ok!(starter.join().unwrap());
        assert!(!controller.is_running());
        assert_eq!(controller.lifecycle_state(), LifecycleState::Stopped);
        assert!(controller.timeout_monitor().is_none());
        assert!(created.lock().as_ref().unwrap().is_shutdown());
        assert!(matches!(
            controller.execute(event()),
            Err(StageError::NotRunning { .. })
        ));
    }

    #[test]
    fn test_empty_task_is_contract_violation() {
        let handler = Arc::new(RecordingHandler::new());
        let controller = controller(handler.clone()).with_customizer(|_event, _task| None);
        assert_ok!(controller.start());

        let err = assert_err!(controller.execute(event()));
        assert!(matches!(err, StageError::EmptyTask { .. }));
        assert_eq!(controller.metrics().submitted(), 0);
        controller.stop();
    }

    #[tokio::test]
    async fn test_execute_runs_handler() {
        let handler = Arc::new(RecordingHandler::new());
        let controller = controller(handler.clone());
        assert_ok!(controller.start());

        let event = event();
        let event_id = event.id();
        let handle = assert_ok!(controller.execute(event));
        assert_eq!(handle.event_id(), event_id);
        assert_eq!(handle.wait().await, TaskStatus::Completed);
        assert_eq!(handler.event_ids(), vec![event_id]);
        assert_eq!(controller.metrics().submitted(), 1);
        controller.stop();
    }

    #[tokio::test]
    async fn test_customizer_wraps_task() {
        let handler = Arc::new(RecordingHandler::new());
        let wrapped = Arc::new(AtomicUsize::new(0));
        let wrapped_clone = wrapped.clone();
        let controller = controller(handler.clone()).with_customizer(move |_event, task| {
            wrapped_clone.fetch_add(1, Ordering::SeqCst);
            Some(task)
        });
        assert_ok!(controller.start());

        let handle = assert_ok!(controller.execute(event()));
        assert_eq!(handle.wait().await, TaskStatus::Completed);
        assert_eq!(wrapped.load(Ordering::SeqCst), 1);
        assert_eq!(handler.call_count(), 1);
        controller.stop();
    }

    #[tokio::test]
    async fn test_message_override_beats_stage_default() {
        let handler = Arc::new(SleepingHandler::new(Duration::from_millis(150)));
        let controller = controller(handler.clone()).with_timeout(5_000);
        assert_ok!(controller.start());

        let event = Event::new(
            "parse",
            Arc::new(TimedPayload::new(serde_json::Value::Null, 30)),
        );
        let handle = assert_ok!(controller.execute(event));

        let status = handle.wait_timeout(Duration::from_secs(2)).await;
        assert_eq!(status, Some(TaskStatus::Cancelled));
        assert_eq!(controller.metrics().timed_out(), 1);
        assert_eq!(handler.completed(), 0);
        controller.stop();
    }

    #[tokio::test]
    async fn test_zero_override_disables_timeout() {
        let handler = Arc::new(SleepingHandler::new(Duration::from_millis(80)));
        let controller = controller(handler.clone()).with_timeout(20);
        assert_ok!(controller.start());

        let event = Event::new(
            "parse",
            Arc::new(TimedPayload::new(serde_json::Value::Null, 0)),
        );
        let handle = assert_ok!(controller.execute(event));

        assert_eq!(handle.wait().await, TaskStatus::Completed);
        assert_eq!(controller.metrics().timed_out(), 0);
        assert_eq!(controller.timeout_monitor().unwrap().pending(), 0);
        controller.stop();
    }

    #[tokio::test]
    async fn test_stop_reports_abandoned_tasks() {
        let handler = Arc::new(SleepingHandler::new(Duration::from_secs(30)));
        let controller = controller(handler.clone()).with_timeout(60_000);
        assert_ok!(controller.start());

        let first = assert_ok!(controller.execute(event()));
        let second = assert_ok!(controller.execute(event()));
        tokio::time::sleep(Duration::from_millis(30)).await;

        let report = controller.stop();
        assert_eq!(report.pool_abandoned, 2);
        assert_eq!(report.timers_abandoned, Some(2));
        assert!(first.is_cancelled());
        assert!(second.is_cancelled());
        assert_eq!(controller.metrics().abandoned(), 2);
    }
}
