//! Pinion Common Library
//!
//! Shared types and contracts for the Pinion I/O workspace.
//!
//! # Module Structure
//!
//! - [`digital`] - Digital state, pull resistance, and time unit types
//! - [`config`] - Per-instance configs and the TOML board file
//! - [`event`] - State-change events and listener handles
//! - [`error`] - Error taxonomy (device, lifecycle, provider, registry)
//! - [`provider`] - Provider, backend, and platform contracts
//! - [`describe`] - Hierarchical description model
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod describe;
pub mod digital;
pub mod error;
pub mod event;
pub mod prelude;
pub mod provider;
