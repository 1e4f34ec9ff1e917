//! Logging setup and task tracing.
//!
//! The crate logs through `tracing`. Applications that do not install their
//! own subscriber can call [`init_tracing`] or [`init_json_tracing`].

use tracing::info_span;
use tracing_subscriber::EnvFilter;

use crate::event::Event;
use crate::task::StageTask;

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs a human-readable subscriber filtered by `RUST_LOG`, falling back
/// to `default_directive` (e.g. `"seda=info"`).
///
/// Returns false if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Installs a JSON subscriber filtered like [`init_tracing`].
pub fn init_json_tracing(default_directive: &str) -> bool {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter(default_directive))
        .try_init()
        .is_ok()
}

/// Task customizer that runs each task inside a `stage.task` span carrying
/// the stage and event ids.
#[must_use]
pub fn tracing_customizer(event: &Event, task: StageTask) -> Option<StageTask> {
    let span = info_span!(
        "stage.task",
        stage = %task.stage_id(),
        event_id = %event.id(),
    );
    Some(task.instrument(span))
}
