//! Configuration types for stage controllers and worker pools.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the default stage timeout in milliseconds.
pub const TIMEOUT_MS_ENV: &str = "SEDA_TIMEOUT_MS";

/// Environment variable holding the timeout monitor thread count.
pub const TIMEOUT_MONITOR_THREADS_ENV: &str = "SEDA_TIMEOUT_MONITOR_THREADS";

/// Configuration for a stage controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Default per-task timeout in milliseconds. Zero disables the monitor.
    #[serde(default)]
    pub timeout_ms: u64,
    /// Number of threads backing the timeout monitor.
    #[serde(default = "default_timeout_monitor_threads")]
    pub timeout_monitor_threads: usize,
}

fn default_timeout_monitor_threads() -> usize {
    1
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 0,
            timeout_monitor_threads: default_timeout_monitor_threads(),
        }
    }
}

impl ControllerConfig {
    /// Creates a new controller configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the timeout monitor thread count.
    #[must_use]
    pub const fn with_timeout_monitor_threads(mut self, threads: usize) -> Self {
        self.timeout_monitor_threads = threads;
        self
    }

    /// Returns the default timeout, or `None` when disabled.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }

    /// Builds a configuration from `SEDA_TIMEOUT_MS` and
    /// `SEDA_TIMEOUT_MONITOR_THREADS`, falling back to defaults for unset or
    /// unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        Self {
            timeout_ms: parse(TIMEOUT_MS_ENV).unwrap_or(defaults.timeout_ms),
            timeout_monitor_threads: parse(TIMEOUT_MONITOR_THREADS_ENV)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.timeout_monitor_threads),
        }
    }
}

/// Sizing of a stage's worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads, which is also the concurrency limit.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Tasks that may wait for a worker before submissions are shed.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Prefix for worker thread names. Defaults to the stage id.
    #[serde(default)]
    pub thread_name_prefix: Option<String>,
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            thread_name_prefix: None,
        }
    }
}

impl PoolConfig {
    /// Creates a pool configuration with the given worker and queue sizes.
    #[must_use]
    pub const fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            thread_name_prefix: None,
        }
    }

    /// Sets the number of workers.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = Some(prefix.into());
        self
    }

    /// Total number of tasks admitted at once (running plus queued).
    #[must_use]
    pub const fn admission_limit(&self) -> usize {
        self.workers.saturating_add(self.queue_capacity)
    }
}
