//! The routing collaborator.
//!
//! A dispatcher decides which stage an event goes to next. The controller
//! only stores it and hands it to the pool factory and to each task, which
//! forwards follow-up events returned by the stage handler.

use tracing::trace;

use crate::event::Event;

/// Routes events between stages.
pub trait Dispatcher: Send + Sync {
    /// Returns a name used in logs.
    fn name(&self) -> &str;

    /// Routes an event to its stage. Must not block.
    fn dispatch(&self, event: Event);
}

/// A dispatcher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDispatcher;

impl Dispatcher for NoOpDispatcher {
    fn name(&self) -> &str {
        "noop"
    }

    fn dispatch(&self, event: Event) {
        trace!(event = %event, "Dropping routed event");
    }
}
