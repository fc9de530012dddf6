use netpreseed_core::config::PluginsConfig;
use netpreseed_core::{ClientContext, Directory};
use std::sync::Arc;

use crate::descriptor::{self, PluginDescriptor};
use crate::error::PluginResult;
use crate::plugin::{PluginInit, PreseedPlugin};
use crate::registry::PluginFactoryRegistry;

/// A plugin instance bound to the request that created it.
pub struct LoadedPlugin {
    pub name: String,
    pub kind: String,
    pub plugin: Box<dyn PreseedPlugin>,
}

/// Plugins of one request, in invocation order.
#[derive(Default)]
pub struct LoadedPlugins {
    plugins: Vec<LoadedPlugin>,
}

impl LoadedPlugins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, plugin: LoadedPlugin) {
        self.plugins.push(plugin);
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LoadedPlugin> {
        self.plugins.iter_mut()
    }
}

impl std::fmt::Debug for LoadedPlugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Discovers definition files and instantiates their plugins.
///
/// Shared by all requests; every call to [`load`](Self::load) produces fresh
/// instances.
#[derive(Debug, Clone)]
pub struct PluginManager {
    config: PluginsConfig,
    factories: Arc<PluginFactoryRegistry>,
}

impl PluginManager {
    pub fn new(config: PluginsConfig, factories: Arc<PluginFactoryRegistry>) -> Self {
        Self { config, factories }
    }

    pub fn config(&self) -> &PluginsConfig {
        &self.config
    }

    pub fn factories(&self) -> &PluginFactoryRegistry {
        &self.factories
    }

    /// Lists definition files, sorted by name, optionally restricted to one.
    pub fn discover(&self, filter: Option<&str>) -> PluginResult<Vec<PluginDescriptor>> {
        descriptor::discover(&self.config.directory, &self.config.extension, filter)
    }

    /// Instantiates every discovered plugin whose definition names a
    /// registered kind.
    ///
    /// Unreadable definitions, definitions without a `kind` and unknown
    /// kinds are skipped. A factory error aborts loading.
    pub async fn load(
        &self,
        filter: Option<&str>,
        directory: Arc<dyn Directory>,
        client: Arc<ClientContext>,
    ) -> PluginResult<LoadedPlugins> {
        let mut loaded = LoadedPlugins::new();

        for descriptor in self.discover(filter)? {
            let definition = match descriptor.read_definition() {
                Ok(definition) => definition,
                Err(e) => {
                    tracing::warn!(
                        plugin = %descriptor.name,
                        path = %descriptor.source_path.display(),
                        error = %e,
                        "Skipping unreadable plugin definition"
                    );
                    continue;
                }
            };

            let Some(kind) = definition.kind else {
                tracing::debug!(plugin = %descriptor.name, "Definition declares no kind, skipped");
                continue;
            };

            let init = PluginInit {
                name: descriptor.name.clone(),
                settings: definition.settings,
                directory: directory.clone(),
                client: client.clone(),
            };

            match self.factories.create(&kind, init) {
                Some(plugin) => {
                    tracing::debug!(plugin = %descriptor.name, kind = %kind, "Plugin loaded");
                    loaded.push(LoadedPlugin {
                        name: descriptor.name,
                        kind,
                        plugin: plugin?,
                    });
                }
                None => {
                    tracing::debug!(plugin = %descriptor.name, kind = %kind, "Unknown plugin kind, skipped");
                }
            }
        }

        Ok(loaded)
    }
}
