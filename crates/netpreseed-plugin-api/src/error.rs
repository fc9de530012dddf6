use netpreseed_core::DirectoryError;
use thiserror::Error;

use crate::plugin::Hook;

/// Plugin system error types
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Invalid settings for plugin {name}: {reason}")]
    Settings { name: String, reason: String },

    #[error("{plugin}::{hook} failed: {source}")]
    Hook {
        plugin: String,
        hook: Hook,
        #[source]
        source: Box<PluginError>,
    },

    #[error("Plugin execution error: {0}")]
    Execution(String),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PluginError {
    /// Creates a settings error.
    pub fn settings(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Settings {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wraps an error raised inside a lifecycle hook.
    pub fn hook(plugin: impl Into<String>, hook: Hook, source: PluginError) -> Self {
        Self::Hook {
            plugin: plugin.into(),
            hook,
            source: Box::new(source),
        }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
