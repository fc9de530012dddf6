//! Plugin Registry - maps plugin kinds to constructors
//!
//! Definition files name a `kind`; the registry is the only place a kind
//! turns into code. Kinds are matched case-insensitively.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::builtin::{DirectivesPlugin, LdapDirectivesPlugin, NetcfgPlugin};
use crate::error::PluginResult;
use crate::plugin::{PluginInit, PreseedPlugin};

/// Builds one plugin instance for one request.
pub type PluginFactory =
    Arc<dyn Fn(PluginInit) -> PluginResult<Box<dyn PreseedPlugin>> + Send + Sync>;

/// Registered plugin kinds.
#[derive(Clone, Default)]
pub struct PluginFactoryRegistry {
    /// Keyed by lowercased kind; value keeps the registered spelling
    factories: BTreeMap<String, (String, PluginFactory)>,
}

impl PluginFactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DirectivesPlugin::KIND, DirectivesPlugin::create);
        registry.register(NetcfgPlugin::KIND, NetcfgPlugin::create);
        registry.register(LdapDirectivesPlugin::KIND, LdapDirectivesPlugin::create);
        registry
    }

    /// Registers `factory` under `kind`, replacing an earlier registration.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(PluginInit) -> PluginResult<Box<dyn PreseedPlugin>> + Send + Sync + 'static,
    {
        let kind = kind.into();
        if self
            .factories
            .insert(kind.to_ascii_lowercase(), (kind.clone(), Arc::new(factory)))
            .is_some()
        {
            tracing::debug!(kind = %kind, "Replaced plugin kind registration");
        }
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(&kind.to_ascii_lowercase())
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.values().map(|(kind, _)| kind.as_str()).collect()
    }

    /// Instantiates `kind`, or returns `None` when it is not registered.
    pub fn create(
        &self,
        kind: &str,
        init: PluginInit,
    ) -> Option<PluginResult<Box<dyn PreseedPlugin>>> {
        self.factories
            .get(&kind.to_ascii_lowercase())
            .map(|(_, factory)| factory(init))
    }
}

impl fmt::Debug for PluginFactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginFactoryRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
