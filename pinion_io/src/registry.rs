//! Central id → instance registry.
//!
//! One map, with the instance id as the only namespace, lets event
//! routing, description, and teardown enumerate every live endpoint
//! without per-provider bookkeeping.
//!
//! Concurrency model: lookups go through an `RwLock`-guarded map and
//! never block on device I/O. Create and destroy serialize on a separate
//! mutation lock, so per-id creation/destruction is linearizable — no
//! double-create, no double-destroy, and the map never exposes a
//! half-initialized or already-shut-down instance. Instances are fully
//! constructed and initialized *before* publication; a failed initialize
//! leaves no entry behind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use pinion_common::config::{DigitalInputConfig, DigitalOutputConfig};
use pinion_common::describe::Descriptor;
use pinion_common::digital::IoType;
use pinion_common::error::RegistryError;
use pinion_common::provider::{DigitalInputProvider, DigitalOutputProvider};

use crate::context::{ContextShared, LifecyclePhase};
use crate::io::{DigitalInput, DigitalOutput, Io};

/// Concurrency-safe store of all live I/O instances, keyed by id.
pub struct Registry {
    shared: Arc<ContextShared>,
    instances: RwLock<HashMap<String, Arc<dyn Io>>>,
    /// Serializes create/destroy; lookups stay lock-free of device I/O.
    mutate: Mutex<()>,
}

impl Registry {
    pub(crate) fn new(shared: Arc<ContextShared>) -> Self {
        Self {
            shared,
            instances: RwLock::new(HashMap::new()),
            mutate: Mutex::new(()),
        }
    }

    fn ensure_initialized(&self) -> Result<(), RegistryError> {
        if self.shared.phase() != LifecyclePhase::Initialized {
            return Err(RegistryError::NotInitialized);
        }
        Ok(())
    }

    // ─── Provider resolution ────────────────────────────────────────

    fn resolve_output_provider(&self) -> Result<Arc<dyn DigitalOutputProvider>, RegistryError> {
        let candidates = self.shared.providers.output_providers();
        let count = candidates.len();
        let mut iter = candidates.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(RegistryError::NoProvider(IoType::Output)),
            (Some(provider), None) => Ok(provider),
            (Some(_), Some(_)) => Err(RegistryError::AmbiguousProvider {
                io_type: IoType::Output,
                count,
            }),
        }
    }

    fn resolve_input_provider(&self) -> Result<Arc<dyn DigitalInputProvider>, RegistryError> {
        let candidates = self.shared.providers.input_providers();
        let count = candidates.len();
        let mut iter = candidates.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(RegistryError::NoProvider(IoType::Input)),
            (Some(provider), None) => Ok(provider),
            (Some(_), Some(_)) => Err(RegistryError::AmbiguousProvider {
                io_type: IoType::Input,
                count,
            }),
        }
    }

    // ─── Creation ───────────────────────────────────────────────────

    /// Create a digital output, resolving the provider by capability.
    ///
    /// Resolution succeeds only when exactly one output provider is
    /// registered; otherwise the caller must name one.
    ///
    /// # Errors
    /// `NotInitialized`, `NoProvider`, `AmbiguousProvider`,
    /// `DuplicateId`, `Provider`, or `Lifecycle` (failed initialize).
    pub fn create_output(
        &self,
        config: DigitalOutputConfig,
    ) -> Result<Arc<DigitalOutput>, RegistryError> {
        self.ensure_initialized()?;
        let provider = self.resolve_output_provider()?;
        self.create_output_with(provider.as_ref(), config)
    }

    /// Create a digital output with the given provider id.
    ///
    /// # Errors
    /// As [`create_output`](Self::create_output), plus `UnknownProvider`.
    pub fn create_output_by_provider_id(
        &self,
        provider_id: &str,
        config: DigitalOutputConfig,
    ) -> Result<Arc<DigitalOutput>, RegistryError> {
        self.ensure_initialized()?;
        let provider = self
            .shared
            .providers
            .output_provider(provider_id)
            .ok_or_else(|| RegistryError::UnknownProvider(provider_id.to_string()))?;
        self.create_output_with(provider.as_ref(), config)
    }

    /// Create a digital output with an explicit provider instance.
    ///
    /// # Errors
    /// As [`create_output`](Self::create_output) minus resolution errors.
    pub fn create_output_with(
        &self,
        provider: &dyn DigitalOutputProvider,
        config: DigitalOutputConfig,
    ) -> Result<Arc<DigitalOutput>, RegistryError> {
        self.ensure_initialized()?;
        let _guard = self.mutate.lock().expect("registry mutation lock poisoned");
        self.reject_duplicate(&config.id)?;

        let writer = provider.open_output(&config)?;
        let instance = Arc::new(DigitalOutput::new(config, provider.id(), writer));
        if let Err(e) = instance.initialize() {
            self.release_failed(instance.as_ref());
            return Err(e.into());
        }

        let id = instance.id().to_string();
        self.publish(id.clone(), Arc::clone(&instance) as Arc<dyn Io>);
        debug!("created output '{id}' via provider '{}'", provider.id());
        Ok(instance)
    }

    /// Create a digital input, resolving the provider by capability.
    ///
    /// # Errors
    /// As [`create_output`](Self::create_output).
    pub fn create_input(
        &self,
        config: DigitalInputConfig,
    ) -> Result<Arc<DigitalInput>, RegistryError> {
        self.ensure_initialized()?;
        let provider = self.resolve_input_provider()?;
        self.create_input_with(provider.as_ref(), config)
    }

    /// Create a digital input with the given provider id.
    ///
    /// # Errors
    /// As [`create_input`](Self::create_input), plus `UnknownProvider`.
    pub fn create_input_by_provider_id(
        &self,
        provider_id: &str,
        config: DigitalInputConfig,
    ) -> Result<Arc<DigitalInput>, RegistryError> {
        self.ensure_initialized()?;
        let provider = self
            .shared
            .providers
            .input_provider(provider_id)
            .ok_or_else(|| RegistryError::UnknownProvider(provider_id.to_string()))?;
        self.create_input_with(provider.as_ref(), config)
    }

    /// Create a digital input with an explicit provider instance.
    ///
    /// # Errors
    /// As [`create_input`](Self::create_input) minus resolution errors.
    pub fn create_input_with(
        &self,
        provider: &dyn DigitalInputProvider,
        config: DigitalInputConfig,
    ) -> Result<Arc<DigitalInput>, RegistryError> {
        self.ensure_initialized()?;
        let _guard = self.mutate.lock().expect("registry mutation lock poisoned");
        self.reject_duplicate(&config.id)?;

        let reader = provider.open_input(&config)?;
        let instance = Arc::new(DigitalInput::new(config, provider.id(), reader));
        if let Err(e) = instance.initialize() {
            self.release_failed(instance.as_ref());
            return Err(e.into());
        }

        let id = instance.id().to_string();
        self.publish(id.clone(), Arc::clone(&instance) as Arc<dyn Io>);
        debug!("created input '{id}' via provider '{}'", provider.id());
        Ok(instance)
    }

    /// Release the backend of an instance whose initialize failed; the
    /// instance was never published, so this is best-effort cleanup.
    fn release_failed(&self, instance: &dyn Io) {
        if let Err(e) = instance.shutdown() {
            warn!(
                "cleanup after failed initialize of '{}' also failed: {e}",
                instance.id()
            );
        }
    }

    fn reject_duplicate(&self, id: &str) -> Result<(), RegistryError> {
        if self
            .instances
            .read()
            .expect("registry lock poisoned")
            .contains_key(id)
        {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }
        Ok(())
    }

    fn publish(&self, id: String, instance: Arc<dyn Io>) {
        self.instances
            .write()
            .expect("registry lock poisoned")
            .insert(id, instance);
    }

    // ─── Lookup ─────────────────────────────────────────────────────

    /// True if an instance is registered under `id`.
    pub fn exists(&self, id: &str) -> bool {
        self.instances
            .read()
            .expect("registry lock poisoned")
            .contains_key(id)
    }

    /// True if an instance is registered under `id` and is a `T`.
    pub fn exists_as<T: Io>(&self, id: &str) -> bool {
        self.instances
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .is_some_and(|instance| Arc::clone(instance).as_any_arc().downcast::<T>().is_ok())
    }

    /// The instance registered under `id`, as its concrete type.
    ///
    /// # Errors
    /// `UnknownId` when absent, `TypeMismatch` when the stored instance
    /// is not a `T`.
    pub fn get<T: Io>(&self, id: &str) -> Result<Arc<T>, RegistryError> {
        let instance = self
            .instances
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownId(id.to_string()))?;
        let actual = instance.io_type();
        instance
            .as_any_arc()
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                id: id.to_string(),
                actual,
            })
    }

    /// Read-only snapshot of all current entries.
    pub fn all(&self) -> HashMap<String, Arc<dyn Io>> {
        self.instances
            .read()
            .expect("registry lock poisoned")
            .clone()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.instances.read().expect("registry lock poisoned").len()
    }

    /// True when no instances are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Destruction ────────────────────────────────────────────────

    /// Remove the instance registered under `id`, shut it down, and
    /// return it.
    ///
    /// The removal happens before the shutdown call, under the mutation
    /// lock, so a concurrent create of the same id can never observe two
    /// instances or a half-dead one.
    ///
    /// # Errors
    /// `UnknownId` when absent; `Lifecycle` when the instance's shutdown
    /// fails (the entry is removed regardless).
    pub fn destroy(&self, id: &str) -> Result<Arc<dyn Io>, RegistryError> {
        self.ensure_initialized()?;
        let _guard = self.mutate.lock().expect("registry mutation lock poisoned");
        let instance = self
            .instances
            .write()
            .expect("registry lock poisoned")
            .remove(id)
            .ok_or_else(|| RegistryError::UnknownId(id.to_string()))?;
        instance.shutdown()?;
        debug!("destroyed '{id}'");
        Ok(instance)
    }

    /// Destroy every registered instance, logging per-instance failures
    /// and carrying on.
    pub(crate) fn destroy_all(&self) {
        let ids: Vec<String> = {
            self.instances
                .read()
                .expect("registry lock poisoned")
                .keys()
                .cloned()
                .collect()
        };
        for id in ids {
            if let Err(e) = self.destroy(&id) {
                warn!("failed to destroy '{id}' during teardown: {e}");
            }
        }
    }

    // ─── Description ────────────────────────────────────────────────

    /// Structured description of all registered instances.
    pub fn describe(&self) -> Descriptor {
        let instances = self.all();
        let mut root =
            Descriptor::new("REGISTRY", "I/O Registered Instances").quantity(instances.len());
        let mut children: Vec<(String, Descriptor)> = instances
            .into_iter()
            .map(|(id, instance)| (id, instance.describe()))
            .collect();
        children.sort_by(|(a, _), (b, _)| a.cmp(b));
        for (_, child) in children {
            root.add(child);
        }
        root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::providers::mock::MockPlugin;
    use pinion_common::digital::DigitalState;

    fn initialized_context() -> (Context, MockPlugin) {
        let context = Context::new();
        let plugin = MockPlugin::new();
        context.attach(&plugin).unwrap();
        context.initialize().unwrap();
        (context, plugin)
    }

    #[test]
    fn create_then_get_returns_same_instance() {
        let (context, _plugin) = initialized_context();
        let registry = context.registry();

        let created = registry
            .create_output(DigitalOutputConfig::new("led", 17))
            .unwrap();
        assert!(registry.exists("led"));
        assert!(registry.exists_as::<DigitalOutput>("led"));
        assert!(!registry.exists_as::<DigitalInput>("led"));

        let fetched = registry.get::<DigitalOutput>("led").unwrap();
        assert!(Arc::ptr_eq(&created, &fetched));
    }

    #[test]
    fn duplicate_id_rejected_original_intact() {
        let (context, _plugin) = initialized_context();
        let registry = context.registry();

        let original = registry
            .create_output(DigitalOutputConfig::new("led", 17))
            .unwrap();
        let err = registry
            .create_output(DigitalOutputConfig::new("led", 18))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "led"));

        let fetched = registry.get::<DigitalOutput>("led").unwrap();
        assert!(Arc::ptr_eq(&original, &fetched));
        assert_eq!(fetched.config().address, 17);
    }

    #[test]
    fn create_before_initialize_rejected() {
        let context = Context::new();
        let plugin = MockPlugin::new();
        context.attach(&plugin).unwrap();

        let err = context
            .registry()
            .create_output(DigitalOutputConfig::new("led", 17))
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotInitialized));
    }

    #[test]
    fn no_provider_and_unknown_provider_errors() {
        let context = Context::new();
        context.initialize().unwrap();
        let registry = context.registry();

        assert!(matches!(
            registry.create_output(DigitalOutputConfig::new("led", 17)),
            Err(RegistryError::NoProvider(IoType::Output))
        ));
        assert!(matches!(
            registry.create_output_by_provider_id("ghost", DigitalOutputConfig::new("led", 17)),
            Err(RegistryError::UnknownProvider(id)) if id == "ghost"
        ));
    }

    #[test]
    fn get_with_wrong_type_fails() {
        let (context, _plugin) = initialized_context();
        let registry = context.registry();
        registry
            .create_output(DigitalOutputConfig::new("led", 17))
            .unwrap();

        let err = registry.get::<DigitalInput>("led").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::TypeMismatch { actual: IoType::Output, .. }
        ));
    }

    #[test]
    fn destroy_removes_and_returns_instance() {
        let (context, _plugin) = initialized_context();
        let registry = context.registry();
        registry
            .create_output(DigitalOutputConfig::new("led", 17))
            .unwrap();

        let destroyed = registry.destroy("led").unwrap();
        assert_eq!(destroyed.id(), "led");
        assert!(!registry.exists("led"));

        assert!(matches!(
            registry.destroy("led"),
            Err(RegistryError::UnknownId(id)) if id == "led"
        ));
    }

    #[test]
    fn failed_initialize_leaves_no_entry() {
        let (context, plugin) = initialized_context();
        let registry = context.registry();

        // Claim the address, then inject a write failure so the initial
        // state cannot be applied on the next create.
        registry
            .create_output(DigitalOutputConfig::new("probe", 30))
            .unwrap();
        plugin.pin(30).unwrap().set_fail_writes(true);
        registry.destroy("probe").unwrap();

        let err = registry
            .create_output(DigitalOutputConfig::new("led", 30).initial(DigitalState::High))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Lifecycle(_)));
        assert!(!registry.exists("led"));
    }

    #[test]
    fn all_returns_snapshot() {
        let (context, _plugin) = initialized_context();
        let registry = context.registry();
        registry
            .create_output(DigitalOutputConfig::new("a", 1))
            .unwrap();
        registry
            .create_input(DigitalInputConfig::new("b", 2))
            .unwrap();

        let snapshot = registry.all();
        assert_eq!(snapshot.len(), 2);

        registry.destroy("a").unwrap();
        // The snapshot is unaffected by later mutations.
        assert_eq!(snapshot.len(), 2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn describe_lists_instances() {
        let (context, _plugin) = initialized_context();
        let registry = context.registry();
        registry
            .create_output(DigitalOutputConfig::new("led", 17).name("Green LED"))
            .unwrap();

        let text = registry.describe().to_string();
        assert!(text.contains("REGISTRY"));
        assert!(text.contains("Green LED"));
        assert!(text.contains("led"));
    }
}
