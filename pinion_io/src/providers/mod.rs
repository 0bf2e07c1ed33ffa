//! Built-in providers.
//!
//! This module contains the provider implementations that ship with the
//! runtime:
//!
//! - [`mock`] - In-memory simulated board for development and testing
//!
//! # Adding New Providers
//!
//! 1. Create a new submodule under `providers/`
//! 2. Implement the provider traits from `pinion_common::provider`
//! 3. Expose a [`Plugin`](crate::plugin::Plugin) that registers them
//! 4. Add export and documentation

pub mod mock;
