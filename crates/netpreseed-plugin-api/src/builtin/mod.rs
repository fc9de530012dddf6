//! Built-in plugin kinds.
//!
//! Each kind is configured entirely by the `settings` section of its
//! definition file and registered by
//! [`PluginFactoryRegistry::with_builtins`](crate::registry::PluginFactoryRegistry::with_builtins).

mod directives;
mod ldap_directives;
mod netcfg;

pub use directives::DirectivesPlugin;
pub use ldap_directives::LdapDirectivesPlugin;
pub use netcfg::NetcfgPlugin;
