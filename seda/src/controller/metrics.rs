//! Counters describing what a stage controller did with its events.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-stage counters. Shared with the timeout monitor.
#[derive(Debug, Default)]
pub struct StageMetrics {
    submitted: AtomicU64,
    rejected: AtomicU64,
    timed_out: AtomicU64,
    abandoned: AtomicU64,
}

/// A point-in-time copy of [`StageMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Events handed to the pool.
    pub submitted: u64,
    /// Submissions shed by the pool.
    pub rejected: u64,
    /// Tasks cancelled by the timeout monitor.
    pub timed_out: u64,
    /// Tasks abandoned by forced shutdowns.
    pub abandoned: u64,
}

impl StageMetrics {
    /// Records a submission.
    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a shed submission.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a timeout cancellation.
    pub fn record_timeout(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Records tasks abandoned at shutdown.
    pub fn record_abandoned(&self, count: usize) {
        self.abandoned
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Returns the number of submissions.
    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Returns the number of shed submissions.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Returns the number of timeout cancellations.
    #[must_use]
    pub fn timed_out(&self) -> u64 {
        self.timed_out.load(Ordering::Relaxed)
    }

    /// Returns the number of tasks abandoned at shutdown.
    #[must_use]
    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    /// Returns a copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted(),
            rejected: self.rejected(),
            timed_out: self.timed_out(),
            abandoned: self.abandoned(),
        }
    }

    /// Returns the shed rate as a percentage of submissions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rejection_rate(&self) -> f64 {
        let submitted = self.submitted();
        if submitted == 0 {
            0.0
        } else {
            (self.rejected() as f64 / submitted as f64) * 100.0
        }
    }

    /// Converts metrics to a dictionary.
    #[must_use]
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({
            "submitted": self.submitted(),
            "rejected": self.rejected(),
            "timed_out": self.timed_out(),
            "abandoned": self.abandoned(),
            "rejection_rate_percent": (self.rejection_rate() * 100.0).round() / 100.0
        })
    }
}
