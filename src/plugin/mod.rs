//! Plugin registry and invoker.
//!
//! Templates call plugins with `src:func|name(args...)`. The logical `name`
//! is resolved through a [`PluginRegistry`]; the core never cares how the
//! callable got there. [`PluginTable`] is the in-process implementation:
//! callables are registered under an instance name and `pluginConfigs`
//! entries bind logical names to those instances.

mod builtin;

pub use builtin::{
    register_builtins, SimSwapPlugin, TimestampPlugin, TransactionIdPlugin,
    SIM_SWAP_INSTANCE, TIMESTAMP_INSTANCE, TRANSACTION_ID_INSTANCE,
};

use crate::config::PluginConfig;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// A callable invocable from templates.
///
/// Arguments are either resolved expression values or literal strings; the
/// plugin does its own coercion. The return value is inserted into the
/// output tree verbatim.
pub trait Plugin: Send + Sync {
    fn execute(&self, args: &[JsonValue]) -> JsonValue;
}

impl<F> Plugin for F
where
    F: Fn(&[JsonValue]) -> JsonValue + Send + Sync,
{
    fn execute(&self, args: &[JsonValue]) -> JsonValue {
        self(args)
    }
}

/// Resolves logical plugin names to callables.
pub trait PluginRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Plugin>>;
}

/// In-process plugin table.
#[derive(Default)]
pub struct PluginTable {
    /// Registered callables by instance name
    instances: HashMap<String, Arc<dyn Plugin>>,
    /// Logical name -> instance name
    bindings: HashMap<String, String>,
}

impl PluginTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with the built-in instances registered.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        register_builtins(&mut table);
        table
    }

    /// Register a callable under an instance name.
    pub fn register_instance<P: Plugin + 'static>(
        &mut self,
        instance_name: impl Into<String>,
        plugin: P,
    ) -> Result<(), PluginError> {
        let instance_name = instance_name.into();
        if self.instances.contains_key(&instance_name) {
            return Err(PluginError::AlreadyRegistered(instance_name));
        }
        self.instances.insert(instance_name, Arc::new(plugin));
        Ok(())
    }

    /// Register a callable and make it callable by the same name.
    pub fn register<P: Plugin + 'static>(
        &mut self,
        name: impl Into<String>,
        plugin: P,
    ) -> Result<(), PluginError> {
        let name = name.into();
        self.register_instance(name.clone(), plugin)?;
        self.bindings.insert(name.clone(), name);
        Ok(())
    }

    /// Bind a logical name to a registered instance.
    pub fn bind(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        if !self.instances.contains_key(&config.instance_name) {
            return Err(PluginError::UnknownInstance {
                name: config.name.clone(),
                instance: config.instance_name.clone(),
            });
        }
        debug!(
            plugin = %config.name,
            instance = %config.instance_name,
            path = %config.path,
            "Bound plugin"
        );
        self.bindings
            .insert(config.name.clone(), config.instance_name.clone());
        Ok(())
    }

    /// Logical names currently bound.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }
}

impl PluginRegistry for PluginTable {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        let instance = self.bindings.get(name)?;
        self.instances.get(instance).cloned()
    }
}

/// Calls plugins by logical name.
#[derive(Clone)]
pub struct PluginInvoker {
    registry: Arc<dyn PluginRegistry>,
}

impl PluginInvoker {
    pub fn new(registry: Arc<dyn PluginRegistry>) -> Self {
        Self { registry }
    }

    /// Invoke `name` with resolved arguments. Unknown names yield null.
    pub fn invoke(&self, name: &str, args: &[JsonValue]) -> JsonValue {
        let Some(plugin) = self.registry.resolve(name) else {
            warn!(plugin = name, "Plugin not registered, resolving to null");
            return JsonValue::Null;
        };

        let result = plugin.execute(args);
        trace!(plugin = name, args = args.len(), result = %result, "Plugin executed");
        result
    }
}

impl Default for PluginInvoker {
    fn default() -> Self {
        Self::new(Arc::new(PluginTable::with_builtins()))
    }
}

/// Plugin registration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    #[error("plugin instance '{0}' already registered")]
    AlreadyRegistered(String),

    #[error("plugin '{name}' refers to unknown instance '{instance}'")]
    UnknownInstance { name: String, instance: String },
}
