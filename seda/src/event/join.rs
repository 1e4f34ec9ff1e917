//! Join notifications for events that belong to a larger unit of work.

use super::Event;
use crate::task::TaskOutcome;

/// Callback invoked after an event's handler has run.
///
/// Not invoked for events that were shed, cancelled, or whose handler
/// panicked.
pub trait JoinHandler: Send + Sync {
    /// Called once from the worker thread that ran the handler.
    fn on_complete(&self, event: &Event, outcome: &TaskOutcome);
}
