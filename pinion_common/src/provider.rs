//! Provider and backend contracts.
//!
//! This module defines:
//! - `DigitalOutputProvider` / `DigitalInputProvider` traits — pluggable
//!   factories, one per I/O category
//! - `DigitalWriter` / `DigitalReader` traits — the device access path a
//!   provider constructs for each endpoint
//! - `Platform` trait — pluggable descriptor of the hardware platform
//!
//! A provider knows how to *open* an access path for a configured address;
//! the runtime wraps that path into a live instance owning the state
//! machine and listener set. Providers are registered once during the
//! context load phase and are immutable afterwards.

use std::sync::Arc;

use crate::config::{DigitalInputConfig, DigitalOutputConfig};
use crate::describe::Descriptor;
use crate::digital::DigitalState;
use crate::error::{IoError, ProviderError};

// ─── Backends ───────────────────────────────────────────────────────

/// Device access path for a digital output endpoint.
///
/// Implementations perform the actual device operation; they hold no
/// logical state machine of their own.
pub trait DigitalWriter: Send + Sync {
    /// Drive the device to the given state.
    ///
    /// # Errors
    /// Returns `IoError::WriteFailed` when the device rejects the write.
    fn write(&self, state: DigitalState) -> Result<(), IoError>;

    /// Release device resources. Called once during instance shutdown.
    fn detach(&self) -> Result<(), IoError> {
        Ok(())
    }
}

/// Callback installed by a digital input instance to receive
/// hardware-driven state changes from its backend.
pub type ChangeSink = Arc<dyn Fn(DigitalState) + Send + Sync>;

/// Device access path for a digital input endpoint.
pub trait DigitalReader: Send + Sync {
    /// Read the current device level.
    ///
    /// # Errors
    /// Returns `IoError::ReadFailed` when the device cannot be read.
    fn read(&self) -> Result<DigitalState, IoError>;

    /// Install the change sink the backend should invoke on
    /// hardware-driven level changes. Default: changes are not pushed.
    fn set_change_sink(&self, _sink: ChangeSink) {}

    /// Release device resources. Called once during instance shutdown.
    fn detach(&self) -> Result<(), IoError> {
        Ok(())
    }
}

// ─── Providers ──────────────────────────────────────────────────────

/// Pluggable factory for digital output access paths.
pub trait DigitalOutputProvider: Send + Sync {
    /// Unique provider identifier (e.g. "mock", "gpiochip").
    fn id(&self) -> &str;

    /// Human-readable provider name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Open a device access path for the configured endpoint.
    ///
    /// # Errors
    /// Returns `ProviderError` when the configuration is unsupported or
    /// construction fails.
    fn open_output(&self, config: &DigitalOutputConfig)
    -> Result<Box<dyn DigitalWriter>, ProviderError>;
}

/// Pluggable factory for digital input access paths.
pub trait DigitalInputProvider: Send + Sync {
    /// Unique provider identifier.
    fn id(&self) -> &str;

    /// Human-readable provider name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Open a device access path for the configured endpoint.
    ///
    /// # Errors
    /// Returns `ProviderError` when the configuration is unsupported or
    /// construction fails.
    fn open_input(&self, config: &DigitalInputConfig)
    -> Result<Box<dyn DigitalReader>, ProviderError>;
}

// ─── Platform ───────────────────────────────────────────────────────

/// Pluggable descriptor of the hardware platform a plugin targets.
///
/// Registered alongside providers. When several platforms are registered
/// the one with the highest weight becomes the context default.
pub trait Platform: Send + Sync {
    /// Unique platform identifier.
    fn id(&self) -> &str;

    /// Human-readable platform name. Defaults to the id.
    fn name(&self) -> &str {
        self.id()
    }

    /// Selection priority for default-platform resolution. Higher wins.
    fn weight(&self) -> i32 {
        0
    }

    /// Structured description of this platform.
    fn describe(&self) -> Descriptor {
        Descriptor::new("PLATFORM", self.name()).id(self.id())
    }
}
