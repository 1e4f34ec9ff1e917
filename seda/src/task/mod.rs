//! Executable units of work and the handles used to observe and cancel them.

mod handle;

pub use handle::{TaskHandle, TaskStatus};

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn, Instrument, Span};
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::event::Event;
use crate::stage::RuntimeStage;

/// How a task body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The handler returned successfully.
    Completed,
    /// The handler returned an error.
    Failed(String),
}

impl TaskOutcome {
    /// Returns true for [`TaskOutcome::Completed`].
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// An event bound to the handler of the stage that will run it.
///
/// The body is an opaque future so that task customizers can wrap it.
pub struct StageTask {
    event_id: Uuid,
    stage_id: String,
    future: BoxFuture<'static, TaskOutcome>,
}

impl StageTask {
    /// Binds `event` to `stage`'s handler. Follow-up events returned by the
    /// handler are routed through `dispatcher`.
    pub fn new(dispatcher: Arc<dyn Dispatcher>, stage: Arc<RuntimeStage>, event: Event) -> Self {
        let event_id = event.id();
        let stage_id = stage.id().to_string();
        let future = run_event(dispatcher, stage, event).boxed();

        Self {
            event_id,
            stage_id,
            future,
        }
    }

    /// Creates a task from an arbitrary future.
    pub fn from_future<Fut>(event_id: Uuid, stage_id: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        Self {
            event_id,
            stage_id: stage_id.into(),
            future: future.boxed(),
        }
    }

    /// Replaces the body with `f(body)`. Used to decorate a task.
    #[must_use]
    pub fn map<F, Fut>(self, f: F) -> Self
    where
        F: FnOnce(BoxFuture<'static, TaskOutcome>) -> Fut,
        Fut: Future<Output = TaskOutcome> + Send + 'static,
    {
        Self {
            event_id: self.event_id,
            stage_id: self.stage_id,
            future: f(self.future).boxed(),
        }
    }

    /// Runs the body inside `span`.
    #[must_use]
    pub fn instrument(self, span: Span) -> Self {
        self.map(|future| future.instrument(span))
    }

    /// Returns the id of the event this task runs.
    #[must_use]
    pub const fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Returns the stage id.
    #[must_use]
    pub fn stage_id(&self) -> &str {
        &self.stage_id
    }

    pub(crate) fn into_future(self) -> BoxFuture<'static, TaskOutcome> {
        self.future
    }
}

impl fmt::Debug for StageTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTask")
            .field("event_id", &self.event_id)
            .field("stage_id", &self.stage_id)
            .finish_non_exhaustive()
    }
}

async fn run_event(
    dispatcher: Arc<dyn Dispatcher>,
    stage: Arc<RuntimeStage>,
    event: Event,
) -> TaskOutcome {
    let outcome = match stage.handler().handle(&event).await {
        Ok(Some(next)) => {
            debug!(
                stage = %stage.id(),
                event_id = %event.id(),
                next = %next,
                dispatcher = %dispatcher.name(),
                "Routing follow-up event"
            );
            dispatcher.dispatch(next);
            TaskOutcome::Completed
        }
        Ok(None) => TaskOutcome::Completed,
        Err(e) => {
            warn!(
                stage = %stage.id(),
                event_id = %event.id(),
                error = %e,
                "Event handler failed"
            );
            TaskOutcome::Failed(format!("{e:#}"))
        }
    };

    if let Some(join) = event.join_handler() {
        join.on_complete(&event, &outcome);
    }

    outcome
}
