use async_trait::async_trait;
use netpreseed_core::directory::{DirectoryEntry, SearchFilter, SearchRequest};
use netpreseed_core::{ClientContext, Directory};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{PluginError, PluginResult};
use crate::output::Output;
use crate::plugin::{PluginInit, PreseedPlugin};

/// Directives stored in the directory, one entry per class.
///
/// During Initialize every client class is looked up with
/// `(&(objectClass=<object_class>)(<class_attribute>=<class>))` below
/// `base_dn`. Each value of `attribute` on a matched entry becomes one raw
/// preseed line; `early_attribute` and `late_attribute` feed the scripts.
pub struct LdapDirectivesPlugin {
    name: String,
    settings: LdapDirectivesSettings,
    directory: Arc<dyn Directory>,
    client: Arc<ClientContext>,
    entries: Vec<DirectoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LdapDirectivesSettings {
    base_dn: Option<String>,
    object_class: String,
    class_attribute: String,
    attribute: String,
    early_attribute: String,
    late_attribute: String,
}

impl Default for LdapDirectivesSettings {
    fn default() -> Self {
        Self {
            base_dn: None,
            object_class: "preseedClass".to_string(),
            class_attribute: "cn".to_string(),
            attribute: "preseedDirective".to_string(),
            early_attribute: "preseedEarlyCommand".to_string(),
            late_attribute: "preseedLateCommand".to_string(),
        }
    }
}

impl LdapDirectivesPlugin {
    pub const KIND: &'static str = "LdapDirectives";

    pub fn create(init: PluginInit) -> PluginResult<Box<dyn PreseedPlugin>> {
        let settings: LdapDirectivesSettings = init.settings()?;
        if settings.base_dn.as_deref().map_or(true, str::is_empty) {
            return Err(PluginError::settings(&init.name, "base_dn is required"));
        }
        Ok(Box::new(Self {
            name: init.name,
            settings,
            directory: init.directory,
            client: init.client,
            entries: Vec::new(),
        }))
    }

    fn write_values(&self, attribute: &str, out: &mut Output) {
        for entry in &self.entries {
            for value in entry.values(attribute) {
                out.line(value.as_str());
            }
        }
    }
}

#[async_trait]
impl PreseedPlugin for LdapDirectivesPlugin {
    async fn initialize(&mut self, _out: &mut Output) -> PluginResult<()> {
        let base = self.settings.base_dn.clone().unwrap_or_default();
        let attributes = [
            self.settings.attribute.as_str(),
            self.settings.early_attribute.as_str(),
            self.settings.late_attribute.as_str(),
        ];

        let mut entries = Vec::new();
        for class in &self.client.classes {
            let filter = SearchFilter::And(vec![
                SearchFilter::equals("objectClass", &self.settings.object_class),
                SearchFilter::equals(&self.settings.class_attribute, class),
            ]);
            let request = SearchRequest::subtree(&base, filter, &attributes);
            let found = self.directory.search(&request).await?;
            debug!(plugin = %self.name, class = %class, entries = found.len(), "Class directives loaded");
            entries.extend(found);
        }

        self.entries = entries;
        Ok(())
    }

    async fn preseed(&mut self, out: &mut Output) -> PluginResult<()> {
        self.write_values(&self.settings.attribute, out);
        Ok(())
    }

    async fn script_early(&mut self, out: &mut Output) -> PluginResult<()> {
        self.write_values(&self.settings.early_attribute, out);
        Ok(())
    }

    async fn script_late(&mut self, out: &mut Output) -> PluginResult<()> {
        self.write_values(&self.settings.late_attribute, out);
        Ok(())
    }
}
