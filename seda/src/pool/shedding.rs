//! Load shedding for saturated pools.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use super::WorkerPool;
use crate::task::StageTask;
use crate::utils::format_timestamp;

/// Invoked by a pool for each submission it refuses.
///
/// Implementations must return promptly, must not panic, and must not
/// resubmit the task.
pub trait RejectionHandler: Send + Sync {
    /// Handles one refused task.
    fn rejected(&self, task: &StageTask, pool: &dyn WorkerPool);
}

/// Drops refused tasks and records the drop.
#[derive(Debug)]
pub struct LoadSheddingPolicy {
    stage_id: RwLock<String>,
    dropped: AtomicU64,
    last_drop_at: RwLock<Option<DateTime<Utc>>>,
}

impl LoadSheddingPolicy {
    /// Creates a policy for the given stage.
    pub fn new(stage_id: impl Into<String>) -> Self {
        Self {
            stage_id: RwLock::new(stage_id.into()),
            dropped: AtomicU64::new(0),
            last_drop_at: RwLock::new(None),
        }
    }

    /// Retargets the policy to another stage.
    pub fn set_stage_context(&self, stage_id: impl Into<String>) {
        *self.stage_id.write() = stage_id.into();
    }

    /// Returns the stage the policy reports for.
    #[must_use]
    pub fn stage_id(&self) -> String {
        self.stage_id.read().clone()
    }

    /// Returns the number of dropped tasks.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns when the last task was dropped.
    #[must_use]
    pub fn last_drop_at(&self) -> Option<DateTime<Utc>> {
        *self.last_drop_at.read()
    }

    /// Converts the counters to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "stage": self.stage_id(),
            "dropped": self.dropped(),
            "last_drop_at": self.last_drop_at().map(format_timestamp),
        })
    }
}

impl RejectionHandler for LoadSheddingPolicy {
    fn rejected(&self, task: &StageTask, pool: &dyn WorkerPool) {
        let dropped_total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_drop_at.write() = Some(Utc::now());

        info!(
            stage = %self.stage_id(),
            event_id = %task.event_id(),
            in_flight = pool.in_flight(),
            shutdown = pool.is_shutdown(),
            dropped_total,
            "Discarded execution for stage"
        );
    }
}
