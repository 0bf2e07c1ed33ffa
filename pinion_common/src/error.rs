//! Error types for the Pinion I/O runtime.
//!
//! The taxonomy distinguishes caller errors (bad arguments, unknown ids,
//! duplicate ids) from environment errors (device and provider failures) so
//! calling code can decide whether a retry makes sense:
//!
//! - [`IoError`] — device-level read/write failures and argument validation
//!   for the timed toggle protocols.
//! - [`LifecycleError`] — initialize/shutdown phase failures wrapping the
//!   underlying device error.
//! - [`ProviderError`] — provider registration and construction failures.
//! - [`RegistryError`] — registry-level failures: resolution, duplicate or
//!   unknown ids, type mismatches, and operations attempted before the
//!   owning context finished loading.

use thiserror::Error;

use crate::digital::{IoType, TimeUnit};

/// Device-level I/O failure or rejected timing argument.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// A state write against the device failed.
    #[error("device write failed on address {address}: {reason}")]
    WriteFailed {
        /// Device address the write targeted.
        address: u32,
        /// Backend-supplied failure description.
        reason: String,
    },

    /// A state read against the device failed.
    #[error("device read failed on address {address}: {reason}")]
    ReadFailed {
        /// Device address the read targeted.
        address: u32,
        /// Backend-supplied failure description.
        reason: String,
    },

    /// A pulse/blink interval of zero or less is not supported.
    #[error("a {what} of zero or less is not supported")]
    InvalidInterval {
        /// Which argument was rejected ("interval", "delay", "duration").
        what: &'static str,
    },

    /// The requested time unit is not a supported toggle granularity.
    #[error("time unit '{0}' is not supported")]
    UnsupportedUnit(TimeUnit),

    /// A background toggle task could not be spawned or joined.
    #[error("toggle task failed: {0}")]
    Task(String),
}

/// Lifecycle-phase failure, wrapping the device error that caused it.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Applying the configured initial state (or installing the change
    /// sink) failed during `initialize`.
    #[error("initialize failed: {0}")]
    Initialize(#[source] IoError),

    /// Applying the configured shutdown state or detaching the backend
    /// failed during `shutdown`.
    #[error("shutdown failed: {0}")]
    Shutdown(#[source] IoError),
}

/// Provider registration or construction failure.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Provider construction logic failed for the given instance.
    #[error("provider '{provider}' failed to create '{id}': {reason}")]
    CreateFailed {
        /// Id of the provider that failed.
        provider: String,
        /// Id of the instance being created.
        id: String,
        /// Provider-supplied failure description.
        reason: String,
    },

    /// The configuration is not supported by this provider.
    #[error("provider '{provider}' does not support config '{id}': {reason}")]
    UnsupportedConfig {
        /// Id of the rejecting provider.
        provider: String,
        /// Id of the offending configuration.
        id: String,
        /// What made the configuration unsupportable.
        reason: String,
    },

    /// A provider or platform with the same id is already registered.
    #[error("duplicate {kind} id '{id}' already registered")]
    DuplicateId {
        /// "provider" or "platform".
        kind: &'static str,
        /// The colliding id.
        id: String,
    },

    /// Plugin registration attempted after the context load phase closed.
    #[error("plugin '{plugin}' cannot register: the context load phase is over")]
    LoadPhaseOver {
        /// Name of the rejected plugin.
        plugin: String,
    },
}

/// Registry-level failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No instance is registered under the given id.
    #[error("no I/O instance registered with id '{0}'")]
    UnknownId(String),

    /// An instance with the given id already exists; creation never
    /// overwrites.
    #[error("an I/O instance with id '{0}' already exists")]
    DuplicateId(String),

    /// The stored instance is not of the requested concrete type.
    #[error("I/O instance '{id}' is a {actual}, not the requested type")]
    TypeMismatch {
        /// Id of the instance that failed the downcast.
        id: String,
        /// Category of the stored instance.
        actual: IoType,
    },

    /// No provider with the given id is registered.
    #[error("no provider registered with id '{0}'")]
    UnknownProvider(String),

    /// No registered provider supports the requested I/O category.
    #[error("no provider registered for {0}")]
    NoProvider(IoType),

    /// More than one provider supports the requested I/O category; the
    /// caller must name one explicitly.
    #[error("{count} providers registered for {io_type}; specify a provider id")]
    AmbiguousProvider {
        /// The ambiguous category.
        io_type: IoType,
        /// How many candidates were found.
        count: usize,
    },

    /// Operation attempted before the owning context completed its load
    /// phase, or after it was shut down.
    #[error("context is not initialized")]
    NotInitialized,

    /// Provider construction failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Instance initialize/shutdown failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let err = RegistryError::DuplicateId("led".into());
        assert!(err.to_string().contains("led"));

        let err = RegistryError::AmbiguousProvider {
            io_type: IoType::Output,
            count: 2,
        };
        assert!(err.to_string().contains("digital output"));

        let err = IoError::WriteFailed {
            address: 17,
            reason: "pin busy".into(),
        };
        assert!(err.to_string().contains("17"));
        assert!(err.to_string().contains("pin busy"));
    }

    #[test]
    fn lifecycle_wraps_io_error() {
        let inner = IoError::ReadFailed {
            address: 4,
            reason: "gone".into(),
        };
        let err = LifecycleError::Initialize(inner);
        assert!(err.to_string().starts_with("initialize failed"));
    }

    #[test]
    fn registry_error_from_provider_error() {
        let err: RegistryError = ProviderError::DuplicateId {
            kind: "provider",
            id: "mock".into(),
        }
        .into();
        assert!(matches!(err, RegistryError::Provider(_)));
    }
}
