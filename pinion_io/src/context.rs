//! Runtime context: provider store ownership and lifecycle phases.
//!
//! The `Context` is the process-wide entry point. It owns the
//! [`ProviderStore`](crate::plugin::ProviderStore) and the
//! [`Registry`](crate::registry::Registry), and tracks the lifecycle
//! phase that gates registry creation calls:
//!
//! ```text
//! Loading ──initialize()──► Initialized ──shutdown()──► Shutdown
//! ```
//!
//! Plugins register providers and platforms during the load phase via
//! [`attach`](Context::attach). Once `initialize()` seals the store, the
//! registry accepts create/destroy calls; `shutdown()` destroys every
//! registered instance and closes the context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::info;

use pinion_common::config::{DigitalInputConfig, DigitalOutputConfig};
use pinion_common::describe::Descriptor;
use pinion_common::error::{ProviderError, RegistryError};
use pinion_common::provider::Platform;

use crate::io::{DigitalInput, DigitalOutput};
use crate::plugin::{Plugin, PluginService, ProviderStore};
use crate::registry::Registry;

// ─── Lifecycle phase ────────────────────────────────────────────────

/// Context lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Plugins may register providers; the registry rejects creation.
    Loading,
    /// The provider store is sealed; the registry is operational.
    Initialized,
    /// All instances destroyed; the context is closed.
    Shutdown,
}

impl LifecyclePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Loading,
            1 => Self::Initialized,
            _ => Self::Shutdown,
        }
    }
}

/// State shared between the context and its registry.
pub(crate) struct ContextShared {
    pub(crate) providers: ProviderStore,
    phase: AtomicU8,
}

impl ContextShared {
    pub(crate) fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }
}

// ─── Context ────────────────────────────────────────────────────────

/// Process-wide I/O runtime context.
pub struct Context {
    shared: Arc<ContextShared>,
    registry: Registry,
}

impl Context {
    /// Create a new context in the load phase.
    pub fn new() -> Self {
        let shared = Arc::new(ContextShared {
            providers: ProviderStore::new(),
            phase: AtomicU8::new(LifecyclePhase::Loading as u8),
        });
        let registry = Registry::new(Arc::clone(&shared));
        info!("context created, load phase open");
        Self { shared, registry }
    }

    pub(crate) fn shared(&self) -> &ContextShared {
        &self.shared
    }

    /// Run a plugin's registration against this context.
    ///
    /// # Errors
    /// Returns `ProviderError::LoadPhaseOver` when called after
    /// `initialize()`, or whatever registration error the plugin hits.
    pub fn attach(&self, plugin: &dyn Plugin) -> Result<(), ProviderError> {
        if self.shared.phase() != LifecyclePhase::Loading {
            return Err(ProviderError::LoadPhaseOver {
                plugin: plugin.name().to_string(),
            });
        }
        info!("attaching plugin '{}'", plugin.name());
        let service = PluginService::new(self);
        plugin.initialize(&service)
    }

    /// Close the load phase and make the registry operational.
    ///
    /// Idempotent while initialized.
    ///
    /// # Errors
    /// Returns `RegistryError::NotInitialized` when the context has
    /// already been shut down.
    pub fn initialize(&self) -> Result<(), RegistryError> {
        match self.shared.phase() {
            LifecyclePhase::Initialized => return Ok(()),
            LifecyclePhase::Shutdown => return Err(RegistryError::NotInitialized),
            LifecyclePhase::Loading => {}
        }
        self.shared.set_phase(LifecyclePhase::Initialized);
        let (outputs, inputs, platforms) = self.shared.providers.counts();
        match self.default_platform() {
            Some(platform) => info!(
                "context initialized: {outputs} output / {inputs} input providers, \
                 {platforms} platforms, default platform '{}'",
                platform.id()
            ),
            None => info!(
                "context initialized: {outputs} output / {inputs} input providers, no platform"
            ),
        }
        Ok(())
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.shared.phase()
    }

    /// The central id → instance registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Read access to the registered providers and platforms.
    pub fn providers(&self) -> &ProviderStore {
        &self.shared.providers
    }

    /// The registered platform with the highest weight, if any.
    pub fn default_platform(&self) -> Option<Arc<dyn Platform>> {
        self.shared.providers.default_platform()
    }

    /// Create a digital output, resolving the provider automatically.
    ///
    /// Convenience for [`Registry::create_output`].
    pub fn create_output(
        &self,
        config: DigitalOutputConfig,
    ) -> Result<Arc<DigitalOutput>, RegistryError> {
        self.registry.create_output(config)
    }

    /// Create a digital input, resolving the provider automatically.
    ///
    /// Convenience for [`Registry::create_input`].
    pub fn create_input(
        &self,
        config: DigitalInputConfig,
    ) -> Result<Arc<DigitalInput>, RegistryError> {
        self.registry.create_input(config)
    }

    /// Destroy every registered instance and close the context.
    ///
    /// Per-instance shutdown failures are logged and do not stop the
    /// teardown. Idempotent.
    pub fn shutdown(&self) {
        match self.shared.phase() {
            LifecyclePhase::Shutdown => return,
            LifecyclePhase::Loading => {
                self.shared.set_phase(LifecyclePhase::Shutdown);
                return;
            }
            LifecyclePhase::Initialized => {}
        }
        self.registry.destroy_all();
        self.shared.set_phase(LifecyclePhase::Shutdown);
        info!("context shutdown complete");
    }

    /// Structured description of the whole runtime.
    pub fn describe(&self) -> Descriptor {
        let mut root = Descriptor::new("CONTEXT", "Pinion Runtime");
        let mut platforms =
            Descriptor::new("PLATFORMS", "Platforms").quantity(self.shared.providers.counts().2);
        for platform in self.shared.providers.platforms() {
            platforms.add(platform.describe());
        }
        root.add(platforms);
        root.add(self.shared.providers.describe());
        root.add(self.registry.describe());
        root
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockPlugin;

    #[test]
    fn phases_progress_in_order() {
        let context = Context::new();
        assert_eq!(context.phase(), LifecyclePhase::Loading);

        context.initialize().unwrap();
        assert_eq!(context.phase(), LifecyclePhase::Initialized);

        // Idempotent while initialized.
        context.initialize().unwrap();

        context.shutdown();
        assert_eq!(context.phase(), LifecyclePhase::Shutdown);

        // Initialize after shutdown is rejected.
        assert!(matches!(
            context.initialize(),
            Err(RegistryError::NotInitialized)
        ));
    }

    #[test]
    fn attach_rejected_after_initialize() {
        let context = Context::new();
        context.initialize().unwrap();

        let plugin = MockPlugin::new();
        let err = context.attach(&plugin).unwrap_err();
        assert!(matches!(err, ProviderError::LoadPhaseOver { .. }));
    }

    #[test]
    fn describe_includes_sections() {
        let context = Context::new();
        let plugin = MockPlugin::new();
        context.attach(&plugin).unwrap();
        context.initialize().unwrap();

        let text = context.describe().to_string();
        assert!(text.contains("CONTEXT"));
        assert!(text.contains("PLATFORMS"));
        assert!(text.contains("PROVIDERS"));
        assert!(text.contains("REGISTRY"));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let context = Context::new();
        context.initialize().unwrap();
        context.shutdown();
        context.shutdown();
        assert_eq!(context.phase(), LifecyclePhase::Shutdown);
    }
}
