use async_trait::async_trait;
use netpreseed_core::ClientContext;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{PluginError, PluginResult};
use crate::output::{Directive, Output};
use crate::plugin::{PluginInit, PreseedPlugin};

/// Network configuration answers derived from the resolved client.
///
/// Emits the hostname and domain found by reverse DNS and the interface to
/// configure. With `force_hostname` the installer is also told to ignore the
/// name offered by DHCP.
pub struct NetcfgPlugin {
    settings: NetcfgSettings,
    client: Arc<ClientContext>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct NetcfgSettings {
    interface: String,
    /// Hostname template; the derived hostname when absent
    hostname: Option<String>,
    force_hostname: bool,
}

impl Default for NetcfgSettings {
    fn default() -> Self {
        Self {
            interface: "auto".to_string(),
            hostname: None,
            force_hostname: false,
        }
    }
}

impl NetcfgPlugin {
    pub const KIND: &'static str = "Netcfg";

    pub fn create(init: PluginInit) -> PluginResult<Box<dyn PreseedPlugin>> {
        let settings: NetcfgSettings = init.settings()?;
        if settings.interface.trim().is_empty() {
            return Err(PluginError::settings(&init.name, "interface must not be empty"));
        }
        Ok(Box::new(Self {
            settings,
            client: init.client,
        }))
    }

    fn hostname(&self) -> String {
        match self.settings.hostname {
            Some(ref template) => self.client.expand(template),
            None => self.client.derived_hostname.clone(),
        }
    }
}

#[async_trait]
impl PreseedPlugin for NetcfgPlugin {
    async fn preseed(&mut self, out: &mut Output) -> PluginResult<()> {
        let hostname = self.hostname();

        out.directive(&Directive {
            kind: "select".to_string(),
            ..Directive::string("netcfg/choose_interface", self.settings.interface.as_str())
        });
        out.directive(&Directive::string("netcfg/get_hostname", hostname.as_str()));
        if let Some(domain) = self.client.domain() {
            out.directive(&Directive::string("netcfg/get_domain", domain));
        }
        if self.settings.force_hostname {
            out.directive(&Directive::string("netcfg/hostname", hostname));
        }
        Ok(())
    }
}
