//! Error types for the netpreseed generator.
//!
//! Configuration and directory failures are the only errors the core crate
//! produces. Client resolution is best-effort and never fails.

use std::io;
use thiserror::Error;

/// Result type alias using PreseedError as the error type.
pub type Result<T> = std::result::Result<T, PreseedError>;

/// Top-level error type for netpreseed operations.
#[derive(Debug, Error)]
pub enum PreseedError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Directory connection and search errors
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors related to configuration.
///
/// These errors occur when loading, parsing, or validating configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Invalid configuration format
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by a directory service.
///
/// The message is what ends up in the `# LDAP Error` line, so it carries the
/// server's text rather than a wrapped error chain.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Could not reach or bind to the directory
    #[error("{message}")]
    Connect { message: String },

    /// The search operation failed
    #[error("{message}")]
    Search { message: String },
}

impl DirectoryError {
    /// Creates a connection error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a search error.
    pub fn search(message: impl Into<String>) -> Self {
        Self::Search {
            message: message.into(),
        }
    }

    /// Maps a failed bind to a connection error, whatever the result code.
    pub fn bind(err: ldap3::LdapError) -> Self {
        match Self::from(err) {
            Self::Connect { message } | Self::Search { message } => Self::Connect { message },
        }
    }
}

impl From<ldap3::LdapError> for DirectoryError {
    fn from(err: ldap3::LdapError) -> Self {
        match err {
            ldap3::LdapError::LdapResult { result } => Self::Search {
                message: format!("{} (rc={})", result.text, result.rc),
            },
            other => Self::Connect {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_error_display_is_bare_message() {
        let err = DirectoryError::connect("Can't contact LDAP server");
        assert_eq!(err.to_string(), "Can't contact LDAP server");
    }

    #[test]
    fn test_rejected_bind_is_a_connect_error() {
        let rejected = || ldap3::LdapError::LdapResult {
            result: ldap3::LdapResult {
                rc: 49,
                matched: String::new(),
                text: "Invalid credentials".to_string(),
                refs: Vec::new(),
                ctrls: Vec::new(),
            },
        };

        let err = DirectoryError::bind(rejected());
        assert!(matches!(err, DirectoryError::Connect { .. }));
        assert_eq!(err.to_string(), "Invalid credentials (rc=49)");

        assert!(matches!(DirectoryError::from(rejected()), DirectoryError::Search { .. }));
    }

    #[test]
    fn test_error_conversion() {
        let err: PreseedError = ConfigError::invalid_value("server.port", "Port cannot be 0").into();
        assert!(matches!(err, PreseedError::Config(_)));
        assert!(err.to_string().contains("server.port"));
    }
}
