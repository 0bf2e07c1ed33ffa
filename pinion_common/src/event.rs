//! State-change events and listener handles.

use core::fmt;

use crate::digital::DigitalState;

/// Immutable record of one digital state transition.
///
/// Delivered synchronously, in registration order, on the thread that
/// performed the transition. Fired only when the new state differs from
/// the previous one; no-op writes never generate events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigitalStateChangeEvent {
    /// Registry id of the instance that transitioned.
    pub id: String,
    /// The state after the transition.
    pub state: DigitalState,
}

impl fmt::Display for DigitalStateChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' -> {}", self.id, self.state)
    }
}

/// Listener invoked on each state transition of one instance.
pub type DigitalStateListener = dyn Fn(&DigitalStateChangeEvent) + Send + Sync;

/// Deregistration handle returned by listener registration.
///
/// Tokens are unique per instance; passing a token back to the instance
/// that issued it removes the associated listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(pub(crate) u64);

impl ListenerToken {
    /// Construct a token from its raw value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token value.
    pub fn raw(self) -> u64 {
        self.0
    }
}
