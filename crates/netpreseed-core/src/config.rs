//! Configuration management for the netpreseed generator.
//!
//! This module provides the configuration system that supports:
//! - Loading from YAML files
//! - Environment variable overrides
//! - Validation of all settings
//! - Directory, plugin, resolver and logging configuration

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::Level;

/// Main application configuration.
///
/// # Examples
///
/// ```no_run
/// use netpreseed_core::config::AppConfig;
///
/// let config = AppConfig::from_file("config.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application-wide settings
    #[serde(default)]
    pub app: ApplicationConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: HttpConfig,

    /// Directory service configuration
    #[serde(default)]
    pub ldap: LdapConfig,

    /// Plugin discovery configuration
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Client resolution configuration
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration using the `config` crate: the file (optional when
    /// `required` is false) overlaid with `NETPRESEED__*` environment variables.
    pub fn from_config_builder<P: AsRef<Path>>(path: P, required: bool) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(required))
            // Override with environment variables (NETPRESEED__LDAP__URL=...)
            .add_source(
                config::Environment::with_prefix("NETPRESEED")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.ldap.validate()?;
        self.plugins.validate()?;
        self.resolver.validate()?;
        self.logging.parse_level()?;
        Ok(())
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Environment (development, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_app_name() -> String {
    "netpreseed".to_string()
}

fn default_environment() -> String {
    "production".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            environment: default_environment(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address
    #[serde(default = "default_http_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Externally visible URL of the preseed endpoint, embedded in the
    /// early/late commands. Derived from the Host header when unset.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Take the client address from `X-Forwarded-For` (reverse proxy setups)
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            public_url: None,
            trust_forwarded_for: false,
        }
    }
}

impl HttpConfig {
    /// Validates the HTTP configuration.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::invalid_value("server.port", "Port cannot be 0").into());
        }

        if let Some(ref public_url) = self.public_url {
            url::Url::parse(public_url)
                .map_err(|e| ConfigError::invalid_value("server.public_url", e.to_string()))?;
        }

        Ok(())
    }

    /// Returns the bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Directory service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Server URL (`ldap://` or `ldaps://`)
    #[serde(default = "default_ldap_url")]
    pub url: String,

    /// Search base
    #[serde(default = "default_base_dn")]
    pub base_dn: String,

    /// Bind DN; anonymous when unset
    #[serde(default)]
    pub bind_dn: Option<String>,

    /// Bind password
    #[serde(default)]
    pub bind_password: Option<String>,

    /// Upgrade plain connections with StartTLS
    #[serde(default)]
    pub starttls: bool,

    /// Connect and operation timeout in seconds
    #[serde(default = "default_ldap_timeout")]
    pub timeout_secs: u64,

    /// Object class of the class-membership entries
    #[serde(default = "default_object_class")]
    pub object_class: String,

    /// Attribute holding the member client names
    #[serde(default = "default_member_attribute")]
    pub member_attribute: String,

    /// Attribute holding the class name
    #[serde(default = "default_class_attribute")]
    pub class_attribute: String,
}

fn default_ldap_url() -> String {
    "ldap://localhost:389".to_string()
}

fn default_base_dn() -> String {
    "dc=example,dc=org".to_string()
}

fn default_ldap_timeout() -> u64 {
    10
}

fn default_object_class() -> String {
    "preseedObject".to_string()
}

fn default_member_attribute() -> String {
    "preseedValue".to_string()
}

fn default_class_attribute() -> String {
    "cn".to_string()
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            url: default_ldap_url(),
            base_dn: default_base_dn(),
            bind_dn: None,
            bind_password: None,
            starttls: false,
            timeout_secs: default_ldap_timeout(),
            object_class: default_object_class(),
            member_attribute: default_member_attribute(),
            class_attribute: default_class_attribute(),
        }
    }
}

impl LdapConfig {
    /// Validates the directory configuration.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(ConfigError::invalid_value("ldap.url", "URL cannot be empty").into());
        }

        if self.base_dn.is_empty() {
            return Err(
                ConfigError::invalid_value("ldap.base_dn", "Base DN cannot be empty").into(),
            );
        }

        if self.bind_password.is_some() && self.bind_dn.is_none() {
            return Err(ConfigError::invalid_value(
                "ldap.bind_password",
                "A bind password requires ldap.bind_dn",
            )
            .into());
        }

        if self.timeout_secs == 0 {
            return Err(
                ConfigError::invalid_value("ldap.timeout_secs", "Timeout cannot be 0").into(),
            );
        }

        Ok(())
    }

    /// Returns the timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory holding plugin definition files
    #[serde(default = "default_plugin_dir")]
    pub directory: PathBuf,

    /// File extension marking a plugin definition
    #[serde(default = "default_plugin_extension")]
    pub extension: String,
}

fn default_plugin_dir() -> PathBuf {
    PathBuf::from("/etc/netpreseed/plugins")
}

fn default_plugin_extension() -> String {
    "yaml".to_string()
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugin_dir(),
            extension: default_plugin_extension(),
        }
    }
}

impl PluginsConfig {
    /// Validates the plugin configuration.
    pub fn validate(&self) -> Result<()> {
        if self.extension.is_empty() || self.extension.contains('.') {
            return Err(ConfigError::invalid_value(
                "plugins.extension",
                format!("Invalid extension: {:?}", self.extension),
            )
            .into());
        }
        Ok(())
    }
}

/// Client resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Perform reverse DNS lookups
    #[serde(default = "default_true")]
    pub reverse_dns: bool,

    /// Look up hardware addresses
    #[serde(default = "default_true")]
    pub arp: bool,

    /// Kernel ARP table, consulted before running the arp command
    #[serde(default = "default_proc_arp")]
    pub proc_arp_path: PathBuf,

    /// arp binary used when the kernel table has no entry
    #[serde(default = "default_arp_command")]
    pub arp_command: PathBuf,

    /// Timeout for the arp command in seconds
    #[serde(default = "default_arp_timeout")]
    pub arp_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_proc_arp() -> PathBuf {
    PathBuf::from("/proc/net/arp")
}

fn default_arp_command() -> PathBuf {
    PathBuf::from("/usr/sbin/arp")
}

fn default_arp_timeout() -> u64 {
    20
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            reverse_dns: true,
            arp: true,
            proc_arp_path: default_proc_arp(),
            arp_command: default_arp_command(),
            arp_timeout_secs: default_arp_timeout(),
        }
    }
}

impl ResolverConfig {
    /// Validates the resolver configuration.
    pub fn validate(&self) -> Result<()> {
        if self.arp_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "resolver.arp_timeout_secs",
                "Timeout cannot be 0",
            )
            .into());
        }
        Ok(())
    }

    /// Returns the arp command timeout as a Duration.
    pub fn arp_timeout(&self) -> Duration {
        Duration::from_secs(self.arp_timeout_secs)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    /// Parses the log level string to a tracing Level.
    pub fn parse_level(&self) -> Result<Level> {
        self.level.parse().map_err(|_| {
            ConfigError::invalid_value("logging.level", format!("Invalid log level: {}", self.level))
                .into()
        })
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON format for structured logging
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.app.name, "netpreseed");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ldap.object_class, "preseedObject");
        assert_eq!(config.ldap.member_attribute, "preseedValue");
        assert_eq!(config.plugins.extension, "yaml");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
server:
  host: 127.0.0.1
  port: 8081
  public_url: http://install.lab.example/preseed

ldap:
  url: ldap://ldap.lab.example
  base_dn: o=lab
  bind_dn: cn=Manager,o=lab
  bind_password: secret

plugins:
  directory: /srv/preseed/plugins

logging:
  level: debug
  format: json
"#;

        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_address(), "127.0.0.1:8081");
        assert_eq!(config.ldap.base_dn, "o=lab");
        assert_eq!(config.ldap.class_attribute, "cn");
        assert_eq!(config.plugins.directory, PathBuf::from("/srv/preseed/plugins"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(AppConfig::from_yaml("server: [unclosed").is_err());
    }

    #[test]
    fn test_port_zero_rejected() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_url_must_parse() {
        let mut config = AppConfig::default();
        config.server.public_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_password_without_bind_dn_rejected() {
        let ldap = LdapConfig {
            bind_password: Some("secret".to_string()),
            ..Default::default()
        };
        assert!(ldap.validate().is_err());
    }

    #[test]
    fn test_plugin_extension_validation() {
        let plugins = PluginsConfig {
            extension: "tar.gz".to_string(),
            ..Default::default()
        };
        assert!(plugins.validate().is_err());
    }

    #[test]
    fn test_logging_parse_level() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            ..Default::default()
        };
        assert!(logging.parse_level().is_ok());

        let invalid = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert!(invalid.parse_level().is_err());
    }

    #[test]
    fn test_missing_optional_file_uses_defaults() {
        let config =
            AppConfig::from_config_builder("/nonexistent/netpreseed.yaml", false).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(LdapConfig::default().timeout(), Duration::from_secs(10));
        assert_eq!(ResolverConfig::default().arp_timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = AppConfig::default();
        config.ldap.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ldap.timeout_secs"));

        let mut config = AppConfig::default();
        config.resolver.arp_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("resolver.arp_timeout_secs"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = std::env::temp_dir().join(format!("netpreseed-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        std::fs::write(&path, "ldap:\n  base_dn: o=file\n  timeout_secs: 5\n").unwrap();

        std::env::set_var("NETPRESEED__LDAP__BASE_DN", "o=env");
        std::env::set_var("NETPRESEED__LDAP__TIMEOUT_SECS", "3");
        let result = AppConfig::from_config_builder(&path, true);
        std::env::remove_var("NETPRESEED__LDAP__BASE_DN");
        std::env::remove_var("NETPRESEED__LDAP__TIMEOUT_SECS");
        std::fs::remove_dir_all(&dir).unwrap();

        let config = result.unwrap();
        assert_eq!(config.ldap.base_dn, "o=env");
        assert_eq!(config.ldap.timeout(), Duration::from_secs(3));
        assert_eq!(config.server.port, 8080);
    }
}
