//! Deferred cancellation of overrunning tasks.
//!
//! The monitor owns a small dedicated runtime. Each armed timer sleeps until
//! its deadline, then cancels the task if it is still unfinished. A task may
//! finish between that check and the cancel call; [`TaskHandle::cancel`] is a
//! no-op on finished tasks, so the race is harmless.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;

use crate::controller::StageMetrics;
use crate::errors::{ConfigurationError, StageResult};
use crate::event::Message;
use crate::task::TaskHandle;

/// Returns the timeout for one message: its own override if it declares one,
/// else the stage default. Zero means no timeout.
#[must_use]
pub fn effective_timeout_ms(message: &dyn Message, stage_default_ms: u64) -> u64 {
    message.timeout_in_millis().unwrap_or(stage_default_ms)
}

/// Arms and fires deferred cancellations for one stage.
pub struct TimeoutMonitor {
    stage_id: String,
    threads: usize,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    timers: Mutex<JoinSet<()>>,
    shutdown: AtomicBool,
    metrics: Arc<StageMetrics>,
}

impl TimeoutMonitor {
    /// Creates a monitor backed by `threads` timer threads.
    pub fn new(
        stage_id: impl Into<String>,
        threads: usize,
        metrics: Arc<StageMetrics>,
    ) -> StageResult<Self> {
        if threads == 0 {
            return Err(ConfigurationError::InvalidTimeoutMonitorThreads(threads).into());
        }
        let stage_id = stage_id.into();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name(format!("{stage_id}-timeout"))
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();

        Ok(Self {
            stage_id,
            threads,
            runtime: Mutex::new(Some(runtime)),
            handle,
            timers: Mutex::new(JoinSet::new()),
            shutdown: AtomicBool::new(false),
            metrics,
        })
    }

    /// Arms a cancellation of `task` after `delay`.
    ///
    /// Returns false, arming nothing, when the delay is zero, the task has
    /// already finished, or the monitor was shut down.
    pub fn schedule(&self, task: &TaskHandle, correlation_id: Uuid, delay: Duration) -> bool {
        if delay.is_zero() || task.is_finished() || self.is_shutdown() {
            return false;
        }

        let task = task.clone();
        let stage_id = self.stage_id.clone();
        let metrics = Arc::clone(&self.metrics);
        let timer = async move {
            tokio::time::sleep(delay).await;
            if task.cancel() {
                metrics.record_timeout();
                debug!(
                    stage = %stage_id,
                    event_id = %correlation_id,
                    timeout_ms = delay.as_millis(),
                    "Cancelling overrunning work"
                );
            } else {
                debug!(
                    stage = %stage_id,
                    event_id = %correlation_id,
                    status = %task.status(),
                    "Work already cancelled/done"
                );
            }
        };

        let mut timers = self.timers.lock();
        // shutdown_now sets the flag before draining under this lock.
        if self.is_shutdown() {
            return false;
        }
        while timers.try_join_next().is_some() {}
        timers.spawn_on(timer, &self.handle);
        true
    }

    /// Returns the number of armed timers that have not fired.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut timers = self.timers.lock();
        while timers.try_join_next().is_some() {}
        timers.len()
    }

    /// Returns the number of timer threads.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Returns true once `shutdown_now` was called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Cancels every pending timer and releases the timer threads.
    ///
    /// Returns the number of timers that had not fired. Later calls return zero.
    pub fn shutdown_now(&self) -> usize {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let abandoned = {
            let mut timers = self.timers.lock();
            while timers.try_join_next().is_some() {}
            let abandoned = timers.len();
            timers.abort_all();
            timers.detach_all();
            abandoned
        };

        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
        debug!(stage = %self.stage_id, abandoned, "Timeout monitor shut down");

        abandoned
    }
}

impl Drop for TimeoutMonitor {
    fn drop(&mut self) {
        self.timers.get_mut().abort_all();
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for TimeoutMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutMonitor")
            .field("stage_id", &self.stage_id)
            .field("threads", &self.threads)
            .field("shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Payload, TimedPayload};
    use crate::task::TaskStatus;

    fn monitor() -> TimeoutMonitor {
        TimeoutMonitor::new("test", 1, Arc::new(StageMetrics::default())).unwrap()
    }

    fn running_handle() -> TaskHandle {
        let handle = TaskHandle::queued(Uuid::new_v4());
        assert!(handle.begin());
        handle
    }

    #[test]
    fn test_effective_timeout() {
        let plain = Payload::new(serde_json::Value::Null);
        let timed = TimedPayload::new(serde_json::Value::Null, 120);
        let disabled = TimedPayload::new(serde_json::Value::Null, 0);

        assert_eq!(effective_timeout_ms(&plain, 50), 50);
        assert_eq!(effective_timeout_ms(&timed, 50), 120);
        assert_eq!(effective_timeout_ms(&disabled, 50), 0);
        assert_eq!(effective_timeout_ms(&plain, 0), 0);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let err = TimeoutMonitor::new("test", 0, Arc::new(StageMetrics::default())).unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_cancels_overrunning_task() {
        let metrics = Arc::new(StageMetrics::default());
        let monitor = TimeoutMonitor::new("test", 1, metrics.clone()).unwrap();
        let handle = running_handle();

        assert!(monitor.schedule(&handle, handle.event_id(), Duration::from_millis(20)));
        assert_eq!(monitor.pending(), 1);

        let status = handle.wait_timeout(Duration::from_secs(2)).await;
        assert_eq!(status, Some(TaskStatus::Cancelled));
        assert_eq!(metrics.timed_out(), 1);
        monitor.shutdown_now();
    }

    #[tokio::test]
    async fn test_late_fire_is_noop_for_finished_task() {
        let metrics = Arc::new(StageMetrics::default());
        let monitor = TimeoutMonitor::new("test", 1, metrics.clone()).unwrap();
        let handle = running_handle();

        assert!(monitor.schedule(&handle, handle.event_id(), Duration::from_millis(20)));
        handle.finish(TaskStatus::Completed);
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(handle.status(), TaskStatus::Completed);
        assert_eq!(metrics.timed_out(), 0);
        assert_eq!(monitor.pending(), 0);
        monitor.shutdown_now();
    }

    #[test]
    fn test_not_armed_for_finished_or_zero() {
        let monitor = monitor();
        let finished = TaskHandle::rejected(Uuid::new_v4());
        let running = running_handle();

        assert!(!monitor.schedule(&finished, finished.event_id(), Duration::from_millis(10)));
        assert!(!monitor.schedule(&running, running.event_id(), Duration::ZERO));
        assert_eq!(monitor.pending(), 0);
    }

    #[test]
    fn test_shutdown_discards_pending_timers() {
        let monitor = monitor();
        let handle = running_handle();

        assert!(monitor.schedule(&handle, handle.event_id(), Duration::from_secs(60)));
        assert_eq!(monitor.shutdown_now(), 1);
        assert!(monitor.is_shutdown());
        assert_eq!(monitor.shutdown_now(), 0);

        assert!(!monitor.schedule(&handle, handle.event_id(), Duration::from_secs(60)));
        assert_eq!(handle.status(), TaskStatus::Running);
    }

    #[test]
    fn test_shutdown_without_timers() {
        let monitor = monitor();
        assert_eq!(monitor.threads(), 1);
        assert_eq!(monitor.shutdown_now(), 0);
    }
}
