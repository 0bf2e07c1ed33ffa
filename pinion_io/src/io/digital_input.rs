//! Digital input endpoint.
//!
//! Reads go live through the provider-opened backend; hardware-driven
//! level changes arrive through a change sink installed at initialize
//! time and are dispatched to listeners as state-change events.

use std::any::Any;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, trace};

use pinion_common::config::DigitalInputConfig;
use pinion_common::describe::Descriptor;
use pinion_common::digital::{DigitalState, IoType, PullResistance};
use pinion_common::error::LifecycleError;
use pinion_common::event::{DigitalStateChangeEvent, DigitalStateListener, ListenerToken};
use pinion_common::provider::DigitalReader;

use crate::io::{Io, ListenerSet};

/// Edge detection and dispatch, shared with the backend change sink.
struct InputCore {
    id: String,
    last: Mutex<DigitalState>,
    listeners: ListenerSet,
}

impl InputCore {
    /// Record a hardware-driven level change and dispatch the event.
    ///
    /// No-op when the level equals the last observed one.
    fn apply(&self, new: DigitalState) {
        let mut last = self.last.lock().expect("input state lock poisoned");
        if *last == new {
            return;
        }
        *last = new;
        trace!("'{}' -> {}", self.id, new);
        let event = DigitalStateChangeEvent {
            id: self.id.clone(),
            state: new,
        };
        self.listeners.dispatch(&event);
    }
}

/// A digital input endpoint.
pub struct DigitalInput {
    config: DigitalInputConfig,
    provider_id: String,
    reader: Box<dyn DigitalReader>,
    core: Arc<InputCore>,
}

impl std::fmt::Debug for DigitalInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalInput")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

impl DigitalInput {
    pub(crate) fn new(
        config: DigitalInputConfig,
        provider_id: &str,
        reader: Box<dyn DigitalReader>,
    ) -> Self {
        let core = Arc::new(InputCore {
            id: config.id.clone(),
            last: Mutex::new(DigitalState::Unknown),
            listeners: ListenerSet::new(),
        });
        Self {
            config,
            provider_id: provider_id.to_string(),
            reader,
            core,
        }
    }

    /// This endpoint's immutable configuration.
    pub fn config(&self) -> &DigitalInputConfig {
        &self.config
    }

    /// Configured pull resistor mode.
    pub fn pull(&self) -> PullResistance {
        self.config.pull
    }

    /// Read the current level through the backend.
    ///
    /// A read failure is logged and reported as `Unknown` rather than
    /// propagated.
    pub fn state(&self) -> DigitalState {
        match self.reader.read() {
            Ok(state) => {
                *self.core.last.lock().expect("input state lock poisoned") = state;
                state
            }
            Err(e) => {
                error!("read failed on input '{}': {e}", self.config.id);
                DigitalState::Unknown
            }
        }
    }

    /// True if the current level reads `High`.
    pub fn is_high(&self) -> bool {
        self.state().is_high()
    }

    /// True if the current level reads `Low`.
    pub fn is_low(&self) -> bool {
        self.state().is_low()
    }

    /// Register a state-change listener. Returns a token for
    /// [`remove_listener`](Self::remove_listener).
    pub fn add_listener<F>(&self, listener: F) -> ListenerToken
    where
        F: Fn(&DigitalStateChangeEvent) + Send + Sync + 'static,
    {
        let listener: Arc<DigitalStateListener> = Arc::new(listener);
        self.core.listeners.add(listener)
    }

    /// Deregister a listener. Returns false when the token is unknown.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        self.core.listeners.remove(token)
    }

    /// Install the backend change sink so hardware-driven changes reach
    /// this instance's listeners.
    pub(crate) fn initialize(&self) -> Result<(), LifecycleError> {
        trace!("initializing input '{}'", self.config.id);
        let weak = Arc::downgrade(&self.core);
        self.reader.set_change_sink(Arc::new(move |state| {
            if let Some(core) = weak.upgrade() {
                core.apply(state);
            }
        }));
        Ok(())
    }
}

impl Io for DigitalInput {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        self.config.display_name()
    }

    fn io_type(&self) -> IoType {
        IoType::Input
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn describe(&self) -> Descriptor {
        Descriptor::new("IN", self.config.display_name()).id(&self.config.id)
    }

    fn shutdown(&self) -> Result<(), LifecycleError> {
        debug!("shutting down input '{}'", self.config.id);
        self.core.listeners.clear();
        self.reader.detach().map_err(LifecycleError::Shutdown)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
