//! Plugin loading and the provider store.
//!
//! Plugins are the unit of extension: each one registers its providers
//! and platforms into the context's [`ProviderStore`] through a
//! [`PluginService`] handed to it during [`Context::attach`]. The store
//! is append-only during the load phase and read-only afterwards, so
//! steady-state registry operations read it without contention concerns.
//!
//! [`Context::attach`]: crate::context::Context::attach

use std::sync::{Arc, RwLock};

use tracing::debug;

use pinion_common::describe::Descriptor;
use pinion_common::error::ProviderError;
use pinion_common::provider::{DigitalInputProvider, DigitalOutputProvider, Platform};

use crate::context::Context;

// ─── Plugin ─────────────────────────────────────────────────────────

/// A pluggable extension registering providers and platforms.
pub trait Plugin: Send + Sync {
    /// Plugin name, for logging.
    fn name(&self) -> &str;

    /// Register this plugin's providers and platforms.
    ///
    /// Called once while the owning context is in its load phase.
    ///
    /// # Errors
    /// Returns `ProviderError` when a registration is rejected.
    fn initialize(&self, service: &PluginService<'_>) -> Result<(), ProviderError>;
}

// ─── PluginService ──────────────────────────────────────────────────

/// Registration facade handed to a plugin during loading.
pub struct PluginService<'a> {
    context: &'a Context,
}

impl<'a> PluginService<'a> {
    pub(crate) fn new(context: &'a Context) -> Self {
        Self { context }
    }

    /// The owning context.
    pub fn context(&self) -> &Context {
        self.context
    }

    /// Register a digital output provider.
    ///
    /// # Errors
    /// Returns `ProviderError::DuplicateId` when a provider with the
    /// same id is already registered.
    pub fn register_output_provider(
        &self,
        provider: Arc<dyn DigitalOutputProvider>,
    ) -> Result<&Self, ProviderError> {
        self.context
            .shared()
            .providers
            .add_output_provider(provider)?;
        Ok(self)
    }

    /// Register a digital input provider.
    ///
    /// # Errors
    /// Returns `ProviderError::DuplicateId` on an id collision.
    pub fn register_input_provider(
        &self,
        provider: Arc<dyn DigitalInputProvider>,
    ) -> Result<&Self, ProviderError> {
        self.context
            .shared()
            .providers
            .add_input_provider(provider)?;
        Ok(self)
    }

    /// Register a platform.
    ///
    /// # Errors
    /// Returns `ProviderError::DuplicateId` on an id collision.
    pub fn register_platform(&self, platform: Arc<dyn Platform>) -> Result<&Self, ProviderError> {
        self.context.shared().providers.add_platform(platform)?;
        Ok(self)
    }
}

// ─── ProviderStore ──────────────────────────────────────────────────

/// Registered providers and platforms, keyed by unique id per category.
///
/// Populated during plugin loading, never mutated afterwards. Duplicate
/// ids are rejected at registration time, never deduplicated silently.
pub struct ProviderStore {
    outputs: RwLock<Vec<Arc<dyn DigitalOutputProvider>>>,
    inputs: RwLock<Vec<Arc<dyn DigitalInputProvider>>>,
    platforms: RwLock<Vec<Arc<dyn Platform>>>,
}

impl ProviderStore {
    pub(crate) fn new() -> Self {
        Self {
            outputs: RwLock::new(Vec::new()),
            inputs: RwLock::new(Vec::new()),
            platforms: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn add_output_provider(
        &self,
        provider: Arc<dyn DigitalOutputProvider>,
    ) -> Result<(), ProviderError> {
        let mut outputs = self.outputs.write().expect("provider store lock poisoned");
        if outputs.iter().any(|p| p.id() == provider.id()) {
            return Err(ProviderError::DuplicateId {
                kind: "provider",
                id: provider.id().to_string(),
            });
        }
        debug!("registered output provider '{}'", provider.id());
        outputs.push(provider);
        Ok(())
    }

    pub(crate) fn add_input_provider(
        &self,
        provider: Arc<dyn DigitalInputProvider>,
    ) -> Result<(), ProviderError> {
        let mut inputs = self.inputs.write().expect("provider store lock poisoned");
        if inputs.iter().any(|p| p.id() == provider.id()) {
            return Err(ProviderError::DuplicateId {
                kind: "provider",
                id: provider.id().to_string(),
            });
        }
        debug!("registered input provider '{}'", provider.id());
        inputs.push(provider);
        Ok(())
    }

    pub(crate) fn add_platform(&self, platform: Arc<dyn Platform>) -> Result<(), ProviderError> {
        let mut platforms = self.platforms.write().expect("provider store lock poisoned");
        if platforms.iter().any(|p| p.id() == platform.id()) {
            return Err(ProviderError::DuplicateId {
                kind: "platform",
                id: platform.id().to_string(),
            });
        }
        debug!("registered platform '{}'", platform.id());
        platforms.push(platform);
        Ok(())
    }

    /// Look up an output provider by id.
    pub fn output_provider(&self, id: &str) -> Option<Arc<dyn DigitalOutputProvider>> {
        self.outputs
            .read()
            .expect("provider store lock poisoned")
            .iter()
            .find(|p| p.id() == id)
            .cloned()
    }

    /// Look up an input provider by id.
    pub fn input_provider(&self, id: &str) -> Option<Arc<dyn DigitalInputProvider>> {
        self.inputs
            .read()
            .expect("provider store lock poisoned")
            .iter()
            .find(|p| p.id() == id)
            .cloned()
    }

    /// Look up a platform by id.
    pub fn platform(&self, id: &str) -> Option<Arc<dyn Platform>> {
        self.platforms
            .read()
            .expect("provider store lock poisoned")
            .iter()
            .find(|p| p.id() == id)
            .cloned()
    }

    /// Snapshot of all registered output providers, in registration order.
    pub fn output_providers(&self) -> Vec<Arc<dyn DigitalOutputProvider>> {
        self.outputs
            .read()
            .expect("provider store lock poisoned")
            .clone()
    }

    /// Snapshot of all registered input providers, in registration order.
    pub fn input_providers(&self) -> Vec<Arc<dyn DigitalInputProvider>> {
        self.inputs
            .read()
            .expect("provider store lock poisoned")
            .clone()
    }

    /// Snapshot of all registered platforms, in registration order.
    pub fn platforms(&self) -> Vec<Arc<dyn Platform>> {
        self.platforms
            .read()
            .expect("provider store lock poisoned")
            .clone()
    }

    /// The registered platform with the highest weight, if any.
    ///
    /// Ties resolve to the earliest registration.
    pub fn default_platform(&self) -> Option<Arc<dyn Platform>> {
        self.platforms()
            .into_iter()
            .fold(None, |best: Option<Arc<dyn Platform>>, candidate| {
                match best {
                    Some(current) if current.weight() >= candidate.weight() => Some(current),
                    _ => Some(candidate),
                }
            })
    }

    /// Counts of (output providers, input providers, platforms).
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.outputs.read().expect("provider store lock poisoned").len(),
            self.inputs.read().expect("provider store lock poisoned").len(),
            self.platforms.read().expect("provider store lock poisoned").len(),
        )
    }

    /// Structured description of all registered providers.
    pub fn describe(&self) -> Descriptor {
        let (outputs, inputs, _) = self.counts();
        let mut root = Descriptor::new("PROVIDERS", "I/O Providers").quantity(outputs + inputs);
        for provider in self.output_providers() {
            root.add(Descriptor::new("OUT-PROVIDER", provider.name()).id(provider.id()));
        }
        for provider in self.input_providers() {
            root.add(Descriptor::new("IN-PROVIDER", provider.name()).id(provider.id()));
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinion_common::config::DigitalOutputConfig;
    use pinion_common::error::IoError;
    use pinion_common::provider::DigitalWriter;

    struct NullWriter;

    impl DigitalWriter for NullWriter {
        fn write(&self, _state: pinion_common::digital::DigitalState) -> Result<(), IoError> {
            Ok(())
        }
    }

    struct NamedOutputProvider(&'static str);

    impl DigitalOutputProvider for NamedOutputProvider {
        fn id(&self) -> &str {
            self.0
        }

        fn open_output(
            &self,
            _config: &DigitalOutputConfig,
        ) -> Result<Box<dyn DigitalWriter>, ProviderError> {
            Ok(Box::new(NullWriter))
        }
    }

    struct WeightedPlatform(&'static str, i32);

    impl Platform for WeightedPlatform {
        fn id(&self) -> &str {
            self.0
        }

        fn weight(&self) -> i32 {
            self.1
        }
    }

    #[test]
    fn store_register_and_lookup() {
        let store = ProviderStore::new();
        store
            .add_output_provider(Arc::new(NamedOutputProvider("alpha")))
            .unwrap();
        store
            .add_output_provider(Arc::new(NamedOutputProvider("beta")))
            .unwrap();

        assert!(store.output_provider("alpha").is_some());
        assert!(store.output_provider("gamma").is_none());
        assert_eq!(store.counts(), (2, 0, 0));
    }

    #[test]
    fn duplicate_provider_id_rejected() {
        let store = ProviderStore::new();
        store
            .add_output_provider(Arc::new(NamedOutputProvider("dup")))
            .unwrap();
        let err = store
            .add_output_provider(Arc::new(NamedOutputProvider("dup")))
            .unwrap_err();
        assert!(matches!(err, ProviderError::DuplicateId { id, .. } if id == "dup"));
        assert_eq!(store.counts(), (1, 0, 0));
    }

    #[test]
    fn default_platform_picks_highest_weight() {
        let store = ProviderStore::new();
        store
            .add_platform(Arc::new(WeightedPlatform("light", 1)))
            .unwrap();
        store
            .add_platform(Arc::new(WeightedPlatform("heavy", 10)))
            .unwrap();
        store
            .add_platform(Arc::new(WeightedPlatform("medium", 5)))
            .unwrap();

        assert_eq!(store.default_platform().unwrap().id(), "heavy");
    }

    #[test]
    fn default_platform_tie_keeps_registration_order() {
        let store = ProviderStore::new();
        store
            .add_platform(Arc::new(WeightedPlatform("first", 3)))
            .unwrap();
        store
            .add_platform(Arc::new(WeightedPlatform("second", 3)))
            .unwrap();

        assert_eq!(store.default_platform().unwrap().id(), "first");
    }
}
