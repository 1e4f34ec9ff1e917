//! Testing utilities for stage controllers.
//!
//! This module provides:
//! - Recording and sleeping event handlers
//! - A dispatcher that collects routed events
//! - A rejection handler that counts shed tasks

mod mocks;

pub use mocks::{CollectingDispatcher, CountingRejectionHandler, RecordingHandler, SleepingHandler};
