//! Error types for the seda stage controller.
//!
//! Only configuration and contract violations surface as errors. Saturation
//! and overrunning tasks are absorbed by the pool and the timeout monitor and
//! are observable through logs and [`StageMetrics`](crate::controller::StageMetrics).

use thiserror::Error;

/// The main error type for stage controller operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// The controller was started with an incomplete or invalid configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// `start()` was called while the controller was not stopped.
    #[error("Stage '{stage}' is already running")]
    AlreadyRunning {
        /// The stage identifier, if one was configured.
        stage: String,
    },

    /// `execute()` was called on a controller that is not running.
    #[error("Stage '{stage}' is not running")]
    NotRunning {
        /// The stage identifier, if one was configured.
        stage: String,
    },

    /// The task customizer returned no task.
    #[error("Task customizer returned no task for stage '{stage}'")]
    EmptyTask {
        /// The stage identifier.
        stage: String,
    },

    /// A dedicated runtime for a pool or timeout monitor could not be built.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Error raised when `start()` finds a missing or invalid collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// No dispatcher was configured.
    #[error("Configuration error: dispatcher must be specified")]
    MissingDispatcher,

    /// No runtime stage was configured.
    #[error("Configuration error: runtime stage must be specified")]
    MissingRuntimeStage,

    /// No worker pool factory was configured.
    #[error("Configuration error: worker pool factory must be specified")]
    MissingPoolFactory,

    /// The timeout monitor thread count must be positive.
    #[error("Configuration error: timeout monitor thread count must be > 0, got {0}")]
    InvalidTimeoutMonitorThreads(usize),

    /// The stage pool must have at least one worker.
    #[error("Configuration error: stage '{stage}' needs at least one worker")]
    InvalidWorkerCount {
        /// The stage identifier.
        stage: String,
    },
}

impl StageError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Result alias for stage controller operations.
pub type StageResult<T> = Result<T, StageError>;
