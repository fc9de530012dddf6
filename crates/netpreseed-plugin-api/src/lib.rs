// netpreseed Plugin API
// Plugin contract, discovery and lifecycle driver for preseed generation

pub mod builtin;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod manager;
pub mod output;
pub mod plugin;
pub mod registry;

pub use descriptor::{PluginDefinition, PluginDescriptor};
pub use driver::LifecycleDriver;
pub use error::{PluginError, PluginResult};
pub use manager::{LoadedPlugin, LoadedPlugins, PluginManager};
pub use output::{Directive, Output};
pub use plugin::{Hook, PluginInit, PreseedPlugin};
pub use registry::{PluginFactory, PluginFactoryRegistry};

// Re-export core types that plugins interact with
pub use netpreseed_core::{ClientContext, Directory};

/// Plugin API version
pub const PLUGIN_API_VERSION: &str = "0.2.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version() {
        assert_eq!(PLUGIN_API_VERSION, "0.2.0");
    }
}
