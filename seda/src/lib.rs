//! # Seda
//!
//! The control core of a staged event-driven architecture.
//!
//! Each stage runs its events on its own bounded worker pool, so a slow stage
//! absorbs its own load without starving the others. On top of the pool the
//! stage controller provides:
//!
//! - **Lifecycle management**: restartable `start`/`stop` with fail-fast
//!   configuration checks
//! - **Timeout monitoring**: overrunning tasks are cancelled without blocking
//!   the submitter
//! - **Load shedding**: a saturated pool drops new work instead of queueing
//!   without bound or blocking the producer
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seda::prelude::*;
//!
//! let stage = RuntimeStage::new("parse", Arc::new(ParseHandler))
//!     .with_pool_config(PoolConfig::new(4, 256));
//!
//! let controller = ThreadPoolStageController::new()
//!     .with_dispatcher(dispatcher)
//!     .with_runtime_stage(stage)
//!     .with_timeout(500);
//! controller.start()?;
//!
//! let handle = controller.execute(Event::new("parse", message))?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod errors;
pub mod event;
pub mod handler;
pub mod observability;
pub mod pool;
pub mod stage;
pub mod task;
pub mod testing;
pub mod timeout;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ControllerConfig, PoolConfig};
    pub use crate::controller::{
        LifecycleState, ShutdownReport, StageController, StageMetrics,
        ThreadPoolStageController,
    };
    pub use crate::dispatcher::{Dispatcher, NoOpDispatcher};
    pub use crate::errors::{ConfigurationError, StageError, StageResult};
    pub use crate::event::{Event, JoinHandler, Message, Payload, TimedPayload};
    pub use crate::handler::{EventHandler, FnEventHandler, HandlerResult};
    pub use crate::pool::{
        BoundedWorkerPool, DefaultWorkerPoolFactory, LoadSheddingPolicy,
        RejectionHandler, WorkerPool, WorkerPoolFactory,
    };
    pub use crate::stage::RuntimeStage;
    pub use crate::task::{StageTask, TaskHandle, TaskOutcome, TaskStatus};
    pub use crate::timeout::TimeoutMonitor;
}
