//! Stage event handlers.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::event::Event;

/// Result of handling an event: an optional follow-up event for the dispatcher.
pub type HandlerResult = anyhow::Result<Option<Event>>;

/// The work a stage performs for each event.
///
/// Handlers run on the stage's worker threads. A handler that exceeds its
/// timeout is cancelled at its next `.await`, so long computations should
/// yield periodically.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles one event. `Ok(Some(next))` routes `next` through the dispatcher.
    async fn handle(&self, event: &Event) -> HandlerResult;
}

type BoxedHandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// An [`EventHandler`] backed by a closure returning a future.
pub struct FnEventHandler {
    func: Box<dyn Fn(Event) -> BoxedHandlerFuture + Send + Sync>,
}

impl FnEventHandler {
    /// Wraps an async closure. The closure receives its own clone of the event.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            func: Box::new(move |event: Event| -> BoxedHandlerFuture { Box::pin(func(event)) }),
        }
    }
}

impl fmt::Debug for FnEventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnEventHandler").finish_non_exhaustive()
    }
}

#[async_trait]
impl EventHandler for FnEventHandler {
    async fn handle(&self, event: &Event) -> HandlerResult {
        (self.func)(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Payload;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fn_handler_forwards_result() {
        let handler = FnEventHandler::new(|event: Event| async move {
            Ok(Some(Event::new("next", Arc::clone(event.message()))))
        });
        let event = Event::new("first", Arc::new(Payload::new(serde_json::Value::Null)));

        let next = handler.handle(&event).await.unwrap().unwrap();
        assert_eq!(next.stage_id(), "next");
    }

    #[tokio::test]
    async fn test_fn_handler_error() {
        let handler = FnEventHandler::new(|_event| async { Err(anyhow::anyhow!("boom")) });
        let event = Event::new("first", Arc::new(Payload::new(serde_json::Value::Null)));

        let err = handler.handle(&event).await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }
}
