//! Mock provider backed by an in-memory simulated board.
//!
//! The `MockBoard` tracks one simulated pin per address. Pins record
//! every accepted write, can fail on demand, and inputs can be driven
//! from test code as if the hardware moved. Pins persist across claim
//! and release so tests can inspect history after an endpoint is
//! destroyed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use pinion_common::config::{DigitalInputConfig, DigitalOutputConfig};
use pinion_common::digital::{DigitalState, PullResistance};
use pinion_common::error::{IoError, ProviderError};
use pinion_common::provider::{
    ChangeSink, DigitalInputProvider, DigitalOutputProvider, DigitalReader, DigitalWriter,
    Platform,
};

use crate::plugin::{Plugin, PluginService};

/// Provider id registered for both mock capabilities.
pub const MOCK_PROVIDER_ID: &str = "mock";
/// Platform id registered by the mock plugin.
pub const MOCK_PLATFORM_ID: &str = "mock-board";

// ─── Pin state ──────────────────────────────────────────────────────

struct PinState {
    address: u32,
    current: Mutex<DigitalState>,
    writes: Mutex<Vec<DigitalState>>,
    sink: Mutex<Option<ChangeSink>>,
    in_use: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl PinState {
    fn new(address: u32) -> Arc<Self> {
        Arc::new(Self {
            address,
            current: Mutex::new(DigitalState::Unknown),
            writes: Mutex::new(Vec::new()),
            sink: Mutex::new(None),
            in_use: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
        })
    }
}

/// Handle to one simulated pin, for tests and demos.
#[derive(Clone)]
pub struct MockPin {
    state: Arc<PinState>,
}

impl MockPin {
    /// The pin's device address.
    pub fn address(&self) -> u32 {
        self.state.address
    }

    /// The pin's current simulated level.
    pub fn current(&self) -> DigitalState {
        *self.state.current.lock().expect("mock pin lock poisoned")
    }

    /// Every write accepted so far, oldest first.
    pub fn writes(&self) -> Vec<DigitalState> {
        self.state
            .writes
            .lock()
            .expect("mock pin lock poisoned")
            .clone()
    }

    /// Make subsequent writes fail with a device error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail with a device error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Move the simulated level, as if the hardware changed, notifying
    /// any input endpoint attached to this pin.
    pub fn drive(&self, state: DigitalState) {
        *self.state.current.lock().expect("mock pin lock poisoned") = state;
        let sink = self
            .state
            .sink
            .lock()
            .expect("mock pin lock poisoned")
            .clone();
        if let Some(sink) = sink {
            sink(state);
        }
    }
}

// ─── Board ──────────────────────────────────────────────────────────

/// The simulated board: one pin per address, shared by both providers.
#[derive(Default)]
struct MockBoard {
    pins: Mutex<HashMap<u32, Arc<PinState>>>,
}

impl MockBoard {
    fn pin(&self, address: u32) -> Option<Arc<PinState>> {
        self.pins
            .lock()
            .expect("mock board lock poisoned")
            .get(&address)
            .cloned()
    }

    /// Claim the pin at `address`, creating it on first use.
    fn claim(&self, address: u32, id: &str) -> Result<Arc<PinState>, ProviderError> {
        let mut pins = self.pins.lock().expect("mock board lock poisoned");
        let pin = pins
            .entry(address)
            .or_insert_with(|| PinState::new(address));
        if pin.in_use.swap(true, Ordering::SeqCst) {
            return Err(ProviderError::CreateFailed {
                provider: MOCK_PROVIDER_ID.to_string(),
                id: id.to_string(),
                reason: format!("address {address} is already in use"),
            });
        }
        Ok(Arc::clone(pin))
    }
}

// ─── Backends ───────────────────────────────────────────────────────

struct MockWriter {
    pin: Arc<PinState>,
}

impl DigitalWriter for MockWriter {
    fn write(&self, state: DigitalState) -> Result<(), IoError> {
        if self.pin.fail_writes.load(Ordering::SeqCst) {
            return Err(IoError::WriteFailed {
                address: self.pin.address,
                reason: "simulated write failure".to_string(),
            });
        }
        *self.pin.current.lock().expect("mock pin lock poisoned") = state;
        self.pin
            .writes
            .lock()
            .expect("mock pin lock poisoned")
            .push(state);
        trace!("mock pin {} written {state}", self.pin.address);
        Ok(())
    }

    fn detach(&self) -> Result<(), IoError> {
        self.pin.in_use.store(false, Ordering::SeqCst);
        Ok(())
    }
}

struct MockReader {
    pin: Arc<PinState>,
}

impl DigitalReader for MockReader {
    fn read(&self) -> Result<DigitalState, IoError> {
        if self.pin.fail_reads.load(Ordering::SeqCst) {
            return Err(IoError::ReadFailed {
                address: self.pin.address,
                reason: "simulated read failure".to_string(),
            });
        }
        Ok(*self.pin.current.lock().expect("mock pin lock poisoned"))
    }

    fn set_change_sink(&self, sink: ChangeSink) {
        *self.pin.sink.lock().expect("mock pin lock poisoned") = Some(sink);
    }

    fn detach(&self) -> Result<(), IoError> {
        *self.pin.sink.lock().expect("mock pin lock poisoned") = None;
        self.pin.in_use.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ─── Providers ──────────────────────────────────────────────────────

/// Mock digital output provider.
pub struct MockDigitalOutputProvider {
    board: Arc<MockBoard>,
}

impl DigitalOutputProvider for MockDigitalOutputProvider {
    fn id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Mock Digital Output Provider"
    }

    fn open_output(
        &self,
        config: &DigitalOutputConfig,
    ) -> Result<Box<dyn DigitalWriter>, ProviderError> {
        let pin = self.board.claim(config.address, &config.id)?;
        Ok(Box::new(MockWriter { pin }))
    }
}

/// Mock digital input provider.
pub struct MockDigitalInputProvider {
    board: Arc<MockBoard>,
}

impl DigitalInputProvider for MockDigitalInputProvider {
    fn id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    fn name(&self) -> &str {
        "Mock Digital Input Provider"
    }

    fn open_input(
        &self,
        config: &DigitalInputConfig,
    ) -> Result<Box<dyn DigitalReader>, ProviderError> {
        let pin = self.board.claim(config.address, &config.id)?;
        // A fresh pin idles at the level its pull resistor biases it to.
        {
            let mut current = pin.current.lock().expect("mock pin lock poisoned");
            if *current == DigitalState::Unknown {
                *current = match config.pull {
                    PullResistance::PullUp => DigitalState::High,
                    PullResistance::PullDown | PullResistance::Off => DigitalState::Low,
                };
            }
        }
        Ok(Box::new(MockReader { pin }))
    }
}

/// Mock platform descriptor.
pub struct MockPlatform;

impl Platform for MockPlatform {
    fn id(&self) -> &str {
        MOCK_PLATFORM_ID
    }

    fn name(&self) -> &str {
        "Mock Board"
    }
}

// ─── Plugin ─────────────────────────────────────────────────────────

/// Plugin registering the mock platform and both mock providers against
/// one shared simulated board.
pub struct MockPlugin {
    board: Arc<MockBoard>,
    output: Arc<MockDigitalOutputProvider>,
    input: Arc<MockDigitalInputProvider>,
}

impl MockPlugin {
    /// New plugin with an empty simulated board.
    pub fn new() -> Self {
        let board = Arc::new(MockBoard::default());
        Self {
            output: Arc::new(MockDigitalOutputProvider {
                board: Arc::clone(&board),
            }),
            input: Arc::new(MockDigitalInputProvider {
                board: Arc::clone(&board),
            }),
            board,
        }
    }

    /// The simulated pin at `address`, once an endpoint has touched it.
    pub fn pin(&self, address: u32) -> Option<MockPin> {
        self.board.pin(address).map(|state| MockPin { state })
    }
}

impl Default for MockPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for MockPlugin {
    fn name(&self) -> &str {
        "mock"
    }

    fn initialize(&self, service: &PluginService<'_>) -> Result<(), ProviderError> {
        service
            .register_output_provider(Arc::clone(&self.output) as Arc<dyn DigitalOutputProvider>)?
            .register_input_provider(Arc::clone(&self.input) as Arc<dyn DigitalInputProvider>)?
            .register_platform(Arc::new(MockPlatform))?;
        Ok(())
    }
}
