//! # Pinion I/O Library
//!
//! Hardware-I/O abstraction with a pluggable provider architecture: a
//! process-wide [`Context`] tracks typed I/O instances in a concurrency-safe
//! [`Registry`], each instance backed by a provider chosen at runtime.
//!
//! # Module Structure
//!
//! - [`context`] - Context, lifecycle phases, plugin attachment
//! - [`plugin`] - Plugin trait, PluginService, ProviderStore
//! - [`registry`] - Central id → instance registry
//! - [`io`] - DigitalOutput / DigitalInput instances
//! - [`task`] - Cancellable async toggle tasks
//! - [`providers`] - Built-in providers (mock board)
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                           Context                              │
//! │  ┌───────────────┐   ┌──────────────┐   ┌──────────────────┐   │
//! │  │ ProviderStore │◄──│ PluginService │   │     Registry     │   │
//! │  │ (load phase)  │   │  (plugins)    │   │  id → Arc<dyn Io>│   │
//! │  └───────┬───────┘   └──────────────┘   └────────┬─────────┘   │
//! │          │ resolve                               │ create      │
//! │          ▼                                       ▼             │
//! │  ┌──────────────┐  open_*   ┌─────────────────────────────┐    │
//! │  │  Provider    │──────────►│ DigitalOutput / DigitalInput│    │
//! │  │ (trait objs) │  backend  │ (state machine + listeners) │    │
//! │  └──────────────┘           └─────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use pinion_common::config::DigitalOutputConfig;
//! use pinion_common::digital::DigitalState;
//! use pinion_io::context::Context;
//! use pinion_io::providers::mock::MockPlugin;
//!
//! let context = Context::new();
//! let plugin = MockPlugin::new();
//! context.attach(&plugin).unwrap();
//! context.initialize().unwrap();
//!
//! let led = context
//!     .create_output(DigitalOutputConfig::new("led", 17).initial(DigitalState::Low))
//!     .unwrap();
//! led.on().unwrap();
//! assert!(led.state().is_high());
//!
//! context.shutdown();
//! ```

pub mod context;
pub mod io;
pub mod plugin;
pub mod providers;
pub mod registry;
pub mod task;

// Re-export key types for convenience
pub use crate::context::{Context, LifecyclePhase};
pub use crate::io::{DigitalInput, DigitalOutput, Io, ToggleCallback};
pub use crate::plugin::{Plugin, PluginService, ProviderStore};
pub use crate::registry::Registry;
pub use crate::task::ToggleTask;
