//! Events and the messages they carry.
//!
//! An [`Event`] pairs a stage identifier with a [`Message`]. Events are
//! immutable once built; their id is only used for correlation in logs.

mod join;
mod message;

pub use join::JoinHandler;
pub use message::{Message, Payload, TimedPayload};

use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::utils::generate_uuid;

/// A unit of work bound to a stage.
#[derive(Clone)]
pub struct Event {
    id: Uuid,
    stage_id: String,
    message: Arc<dyn Message>,
    join_handler: Option<Arc<dyn JoinHandler>>,
}

impl Event {
    /// Creates an event for `stage_id` without a join handler.
    pub fn new(stage_id: impl Into<String>, message: Arc<dyn Message>) -> Self {
        Self {
            id: generate_uuid(),
            stage_id: stage_id.into(),
            message,
            join_handler: None,
        }
    }

    /// Creates an event that notifies `join_handler` once its handler finishes.
    pub fn with_join_handler(
        stage_id: impl Into<String>,
        message: Arc<dyn Message>,
        join_handler: Arc<dyn JoinHandler>,
    ) -> Self {
        Self {
            id: generate_uuid(),
            stage_id: stage_id.into(),
            message,
            join_handler: Some(join_handler),
        }
    }

    /// Copies the stage and message of `event` into a new event bound to
    /// `join_handler`. The copy gets a fresh id.
    #[must_use]
    pub fn rejoin(event: &Self, join_handler: Arc<dyn JoinHandler>) -> Self {
        Self::with_join_handler(event.stage_id.clone(), Arc::clone(&event.message), join_handler)
    }

    /// Returns the correlation id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the target stage identifier.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &Arc<dyn Message> {
        &self.message
    }

    /// Returns the join handler, if any.
    #[must_use]
    pub fn join_handler(&self) -> Option<&Arc<dyn JoinHandler>> {
        self.join_handler.as_ref()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event[stage:{}; id:{}]", self.stage_id, self.id)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("stage_id", &self.stage_id)
            .field("message", &self.message)
            .field("has_join_handler", &self.join_handler.is_some())
            .finish()
    }
}
