//! Common re-exports for convenience.
//!
//! ```rust
//! use pinion_common::prelude::*;
//! ```

pub use crate::config::{BoardConfig, DigitalInputConfig, DigitalOutputConfig};
pub use crate::describe::Descriptor;
pub use crate::digital::{DigitalState, IoType, PullResistance, TimeUnit};
pub use crate::error::{IoError, LifecycleError, ProviderError, RegistryError};
pub use crate::event::{DigitalStateChangeEvent, ListenerToken};
pub use crate::provider::{
    DigitalInputProvider, DigitalOutputProvider, DigitalReader, DigitalWriter, Platform,
};
