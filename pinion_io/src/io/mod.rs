//! Live I/O instances.
//!
//! One concrete struct per I/O category, each composing identity, config,
//! a state field, a listener set, and the backend its provider opened:
//!
//! - [`DigitalOutput`] - commanded endpoint with pulse/blink protocols
//! - [`DigitalInput`] - observed endpoint with hardware-driven events
//!
//! Both implement the object-safe [`Io`] trait the registry stores them
//! under.

pub mod digital_input;
pub mod digital_output;

pub use digital_input::DigitalInput;
pub use digital_output::{DigitalOutput, ToggleCallback};

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

use pinion_common::describe::Descriptor;
use pinion_common::digital::IoType;
use pinion_common::error::LifecycleError;
use pinion_common::event::{DigitalStateChangeEvent, DigitalStateListener, ListenerToken};

// ─── Io trait ───────────────────────────────────────────────────────

/// A live, addressable device endpoint tracked by the registry.
pub trait Io: Any + Send + Sync {
    /// Registry identifier, unique per context.
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;

    /// I/O category of this instance.
    fn io_type(&self) -> IoType;

    /// Id of the provider that created this instance.
    fn provider_id(&self) -> &str;

    /// Structured description of this instance.
    fn describe(&self) -> Descriptor;

    /// Release the endpoint: apply any configured shutdown behavior,
    /// drop listeners, and detach the backend.
    ///
    /// # Errors
    /// Returns `LifecycleError::Shutdown` wrapping the device failure.
    fn shutdown(&self) -> Result<(), LifecycleError>;

    /// Upcast for checked downcasting at the registry boundary.
    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

// ─── ListenerSet ────────────────────────────────────────────────────

/// Ordered listener collection with token-based deregistration.
///
/// Shared by both digital instance kinds. Dispatch is synchronous, in
/// registration order, on the calling thread; a panicking listener is
/// logged and skipped, never aborting the remaining listeners.
pub(crate) struct ListenerSet {
    entries: Mutex<Vec<(ListenerToken, Arc<DigitalStateListener>)>>,
    next_token: AtomicU64,
}

impl ListenerSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        }
    }

    pub(crate) fn add(&self, listener: Arc<DigitalStateListener>) -> ListenerToken {
        let token = ListenerToken::from_raw(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .expect("listener set lock poisoned")
            .push((token, listener));
        token
    }

    pub(crate) fn remove(&self, token: ListenerToken) -> bool {
        let mut entries = self.entries.lock().expect("listener set lock poisoned");
        let before = entries.len();
        entries.retain(|(t, _)| *t != token);
        entries.len() != before
    }

    pub(crate) fn clear(&self) {
        self.entries
            .lock()
            .expect("listener set lock poisoned")
            .clear();
    }

    pub(crate) fn dispatch(&self, event: &DigitalStateChangeEvent) {
        // Snapshot so listeners may register/deregister during dispatch.
        let snapshot: Vec<Arc<DigitalStateListener>> = self
            .entries
            .lock()
            .expect("listener set lock poisoned")
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| (*listener)(event))).is_err() {
                error!("state-change listener for '{}' panicked, continuing", event.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinion_common::digital::DigitalState;
    use std::sync::atomic::AtomicUsize;

    fn event() -> DigitalStateChangeEvent {
        DigitalStateChangeEvent {
            id: "pin".to_string(),
            state: DigitalState::High,
        }
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let set = ListenerSet::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            set.add(Arc::new(move |_e| {
                order.lock().unwrap().push(tag);
            }));
        }

        set.dispatch(&event());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn removed_listener_no_longer_fires() {
        let set = ListenerSet::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        let token = set.add(Arc::new(move |_e| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        set.dispatch(&event());
        assert!(set.remove(token));
        set.dispatch(&event());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Removing twice reports nothing removed.
        assert!(!set.remove(token));
    }

    #[test]
    fn panicking_listener_does_not_abort_dispatch() {
        let set = ListenerSet::new();
        let count = Arc::new(AtomicUsize::new(0));

        set.add(Arc::new(|_e| panic!("bad listener")));
        let counter = Arc::clone(&count);
        set.add(Arc::new(move |_e| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        set.dispatch(&event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
