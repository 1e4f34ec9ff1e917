//! Lifecycle states of a stage controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Where a controller is in its start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LifecycleState {
    /// Not running. Initial state; also reached after every `stop()`.
    Stopped = 0,
    /// `start()` is validating and acquiring resources.
    Starting = 1,
    /// Accepting events.
    Running = 2,
    /// `stop()` is shutting down the pool and the timeout monitor.
    Stopping = 3,
    /// `stop()` arrived while starting; the run is torn down as soon as
    /// `start()` has built it.
    StopPending = 4,
}

impl LifecycleState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            4 => Self::StopPending,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::StopPending => "stop_pending",
        };
        write!(f, "{s}")
    }
}

/// A [`LifecycleState`] shared across threads.
#[derive(Debug)]
pub(crate) struct AtomicLifecycle(AtomicU8);

impl AtomicLifecycle {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Stopped as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn store(&self, state: LifecycleState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }

    /// Moves from `from` to `to`. On failure returns the actual state.
    pub(crate) fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> Result<(), LifecycleState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(LifecycleState::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_stopped() {
        assert_eq!(AtomicLifecycle::new().load(), LifecycleState::Stopped);
    }

    #[test]
    fn test_transition() {
        let state = AtomicLifecycle::new();
        assert_eq!(
            state.transition(LifecycleState::Stopped, LifecycleState::Starting),
            Ok(())
        );
        assert_eq!(
            state.transition(LifecycleState::Stopped, LifecycleState::Starting),
            Err(LifecycleState::Starting)
        );
        state.store(LifecycleState::Running);
        assert_eq!(state.load(), LifecycleState::Running);
        assert_eq!(LifecycleState::Running.to_string(), "running");
    }

    #[test]
    fn test_stop_pending_round_trips() {
        let state = AtomicLifecycle::new();
        state.store(LifecycleState::Starting);
        assert_eq!(
            state.transition(LifecycleState::Starting, LifecycleState::StopPending),
            Ok(())
        );
        assert_eq!(
            state.transition(LifecycleState::Starting, LifecycleState::Running),
            Err(LifecycleState::StopPending)
        );
        assert_eq!(LifecycleState::StopPending.to_string(), "stop_pending");
    }
}
