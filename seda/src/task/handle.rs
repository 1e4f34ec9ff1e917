//! Handle to a submitted task.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use uuid::Uuid;

/// Lifecycle of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Admitted, waiting for a worker.
    Queued,
    /// Running on a worker.
    Running,
    /// The handler returned successfully.
    Completed,
    /// The handler returned an error or panicked.
    Failed,
    /// Cancelled by a timeout, an explicit cancel, or pool shutdown.
    Cancelled,
    /// Refused by the pool and shed. Never ran.
    Rejected,
}

impl TaskStatus {
    /// Returns true once the status can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

struct Inner {
    event_id: Uuid,
    status: watch::Sender<TaskStatus>,
    abort: Mutex<Option<AbortHandle>>,
}

/// A cloneable, cancellable view of a submitted task.
///
/// Status transitions happen under the channel lock and a terminal status is
/// never overwritten, so cancelling a finished task is a no-op.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<Inner>,
}

impl TaskHandle {
    fn with_status(event_id: Uuid, status: TaskStatus) -> Self {
        let (tx, _rx) = watch::channel(status);
        Self {
            inner: Arc::new(Inner {
                event_id,
                status: tx,
                abort: Mutex::new(None),
            }),
        }
    }

    pub(crate) fn queued(event_id: Uuid) -> Self {
        Self::with_status(event_id, TaskStatus::Queued)
    }

    pub(crate) fn rejected(event_id: Uuid) -> Self {
        Self::with_status(event_id, TaskStatus::Rejected)
    }

    /// Binds the spawned tokio task. Aborts it right away if the handle was
    /// cancelled before the task was attached.
    pub(crate) fn attach(&self, abort: AbortHandle) {
        let mut slot = self.inner.abort.lock();
        if self.is_cancelled() {
            abort.abort();
        }
        *slot = Some(abort);
    }

    /// Marks the task as running. Returns false if it was cancelled while queued.
    pub(crate) fn begin(&self) -> bool {
        self.inner.status.send_if_modified(|status| {
            if *status == TaskStatus::Queued {
                *status = TaskStatus::Running;
                true
            } else {
                false
            }
        })
    }

    /// Moves to a terminal status unless one was already reached.
    pub(crate) fn finish(&self, outcome: TaskStatus) -> bool {
        debug_assert!(outcome.is_terminal());
        self.inner.status.send_if_modified(|status| {
            if status.is_terminal() {
                false
            } else {
                *status = outcome;
                true
            }
        })
    }

    /// Cancels the task if it has not finished yet.
    ///
    /// Returns true if this call cancelled it. A running task is aborted at
    /// its next `.await` point.
    pub fn cancel(&self) -> bool {
        let cancelled = self.finish(TaskStatus::Cancelled);
        if cancelled {
            if let Some(abort) = self.inner.abort.lock().as_ref() {
                abort.abort();
            }
        }
        cancelled
    }

    /// Returns the id of the event this task runs.
    #[must_use]
    pub fn event_id(&self) -> Uuid {
        self.inner.event_id
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        *self.inner.status.borrow()
    }

    /// Returns true once the task completed, failed, was cancelled, or was shed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Returns true if the task was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status() == TaskStatus::Cancelled
    }

    /// Waits until the task reaches a terminal status.
    pub async fn wait(&self) -> TaskStatus {
        let mut rx = self.inner.status.subscribe();
        let result = rx.wait_for(TaskStatus::is_terminal).await.map(|s| *s);
        // The sender lives in `self`, so the channel cannot close here.
        result.unwrap_or_else(|_| self.status())
    }

    /// Waits up to `timeout` for a terminal status.
    pub async fn wait_timeout(&self, timeout: Duration) -> Option<TaskStatus> {
        tokio::time::timeout(timeout, self.wait()).await.ok()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("event_id", &self.inner.event_id)
            .field("status", &self.status())
            .finish()
    }
}
