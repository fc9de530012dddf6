//! The plugin contract.

use async_trait::async_trait;
use netpreseed_core::{ClientContext, Directory};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

use crate::error::{PluginError, PluginResult};
use crate::output::Output;

/// Lifecycle hooks, in the order the driver may call them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Initialize,
    Preseed,
    ScriptEarly,
    ScriptLate,
    Deinitialize,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::Initialize => "Initialize",
            Hook::Preseed => "Preseed",
            Hook::ScriptEarly => "ScriptEarly",
            Hook::ScriptLate => "ScriptLate",
            Hook::Deinitialize => "Deinitialize",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A preseed plugin instance, living for exactly one request.
///
/// Every hook writes to the shared response. Only `preseed` is mandatory;
/// the others default to doing nothing.
#[async_trait]
pub trait PreseedPlugin: Send {
    async fn initialize(&mut self, _out: &mut Output) -> PluginResult<()> {
        Ok(())
    }

    async fn preseed(&mut self, out: &mut Output) -> PluginResult<()>;

    async fn script_early(&mut self, _out: &mut Output) -> PluginResult<()> {
        Ok(())
    }

    async fn script_late(&mut self, _out: &mut Output) -> PluginResult<()> {
        Ok(())
    }

    async fn deinitialize(&mut self, _out: &mut Output) -> PluginResult<()> {
        Ok(())
    }
}

/// Everything a factory gets to build a plugin instance.
#[derive(Clone)]
pub struct PluginInit {
    /// Plugin name derived from the definition file
    pub name: String,
    /// `settings` section of the definition file (`Null` when absent)
    pub settings: serde_yaml::Value,
    /// Directory session of the current request
    pub directory: Arc<dyn Directory>,
    /// Fully resolved client, read-only
    pub client: Arc<ClientContext>,
}

impl PluginInit {
    /// Deserializes the settings section, treating a missing section as an
    /// empty mapping.
    pub fn settings<T: DeserializeOwned + Default>(&self) -> PluginResult<T> {
        if self.settings.is_null() {
            return Ok(T::default());
        }
        serde_yaml::from_value(self.settings.clone())
            .map_err(|e| PluginError::settings(&self.name, e.to_string()))
    }
}

impl fmt::Debug for PluginInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInit")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("client", &self.client.name)
            .finish_non_exhaustive()
    }
}
