//! Mock collaborators for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::dispatcher::Dispatcher;
use crate::event::Event;
use crate::handler::{EventHandler, HandlerResult};
use crate::pool::{RejectionHandler, WorkerPool};
use crate::task::StageTask;

/// A handler that records the events it sees and returns nothing.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Uuid>>,
}

impl RecordingHandler {
    /// Creates a new recording handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of handled events.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns the ids of handled events, in order.
    #[must_use]
    pub fn event_ids(&self) -> Vec<Uuid> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) -> HandlerResult {
        self.events.lock().push(event.id());
        Ok(None)
    }
}

/// A handler that sleeps before completing.
///
/// The sleep is an `.await` point, so timeouts and shutdowns interrupt it.
#[derive(Debug)]
pub struct SleepingHandler {
    delay: Duration,
    started: AtomicUsize,
    completed: AtomicUsize,
}

impl SleepingHandler {
    /// Creates a handler that sleeps for `delay`.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    /// Returns how many events started sleeping.
    #[must_use]
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Returns how many events slept to the end.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for SleepingHandler {
    async fn handle(&self, _event: &Event) -> HandlerResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

/// A dispatcher that keeps every routed event.
#[derive(Debug, Default)]
pub struct CollectingDispatcher {
    events: Mutex<Vec<Event>>,
}

impl CollectingDispatcher {
    /// Creates a new collecting dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the target stage of each routed event, in order.
    #[must_use]
    pub fn stage_ids(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.stage_id().to_string())
            .collect()
    }

    /// Returns the number of routed events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing was routed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Dispatcher for CollectingDispatcher {
    fn name(&self) -> &str {
        "collecting"
    }

    fn dispatch(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// A rejection handler that records each shed task.
#[derive(Debug, Default)]
pub struct CountingRejectionHandler {
    rejected: Mutex<Vec<Uuid>>,
}

impl CountingRejectionHandler {
    /// Creates a new counting handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rejected tasks.
    #[must_use]
    pub fn count(&self) -> usize {
        self.rejected.lock().len()
    }

    /// Returns the event ids of rejected tasks, in order.
    #[must_use]
    pub fn event_ids(&self) -> Vec<Uuid> {
        self.rejected.lock().clone()
    }
}

impl RejectionHandler for CountingRejectionHandler {
    fn rejected(&self, task: &StageTask, _pool: &dyn WorkerPool) {
        self.rejected.lock().push(task.event_id());
    }
}
