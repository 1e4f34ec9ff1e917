//! Message payloads.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt::Debug;

/// The payload carried by an [`Event`](super::Event).
///
/// A message may declare its own timeout. When it does, the declared value
/// replaces the stage default for that event; zero disables the timeout for
/// that event only.
pub trait Message: Send + Sync + Debug + 'static {
    /// Returns the timeout override in milliseconds, if the message has one.
    fn timeout_in_millis(&self) -> Option<u64> {
        None
    }

    /// Returns `self` for downcasting by handlers.
    fn as_any(&self) -> &dyn Any;
}

/// A JSON payload without a timeout override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// The message body.
    pub body: serde_json::Value,
}

impl Payload {
    /// Creates a new payload.
    #[must_use]
    pub const fn new(body: serde_json::Value) -> Self {
        Self { body }
    }
}

impl Message for Payload {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A JSON payload that declares its own timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedPayload {
    /// The message body.
    pub body: serde_json::Value,
    /// Timeout override in milliseconds.
    pub timeout_ms: u64,
}

impl TimedPayload {
    /// Creates a new payload with a timeout override.
    #[must_use]
    pub const fn new(body: serde_json::Value, timeout_ms: u64) -> Self {
        Self { body, timeout_ms }
    }
}

impl Message for TimedPayload {
    fn timeout_in_millis(&self) -> Option<u64> {
        Some(self.timeout_ms)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_has_no_override() {
        let msg = Payload::new(serde_json::json!("hello"));
        assert_eq!(msg.timeout_in_millis(), None);
    }

    #[test]
    fn test_timed_payload_override() {
        let msg = TimedPayload::new(serde_json::Value::Null, 120);
        assert_eq!(msg.timeout_in_millis(), Some(120));
    }

    #[test]
    fn test_downcast() {
        let msg: Box<dyn Message> = Box::new(Payload::new(serde_json::json!({"k": "v"})));
        let payload = msg.as_any().downcast_ref::<Payload>().unwrap();
        assert_eq!(payload.body["k"], "v");
        assert!(msg.as_any().downcast_ref::<TimedPayload>().is_none());
    }
}
