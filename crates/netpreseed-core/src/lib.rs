//! # netpreseed Core
//!
//! Core types, error handling, configuration and directory access for the
//! netpreseed installer configuration generator.
//!
//! - **Types**: request parameters, output mode, and the immutable
//!   `ClientContext` built once per request.
//! - **Directory**: typed LDAP search filters, the `Directory` session trait,
//!   an LDAP backend and an in-memory backend.
//! - **Script**: callback URLs and shell command lines for the early/late
//!   installer scripts.
//! - **Configuration**: YAML files with environment variable overrides.
//!
//! ## Example
//!
//! ```
//! use netpreseed_core::types::{ClientContext, RequestParams};
//!
//! let params = RequestParams::parse("class=web&node=n7");
//! let client = ClientContext::builder("10.0.0.5".parse().unwrap())
//!     .reverse_name(Some("host1.lab.example".to_string()))
//!     .apply_params(&params)
//!     .build();
//!
//! assert_eq!(client.derived_hostname, "host1");
//! assert_eq!(client.classes, vec!["default", "web", "n7"]);
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod script;
pub mod types;

pub use config::AppConfig;
pub use directory::{Directory, DirectoryConnector, DirectoryEntry, StaticDirectory};
pub use error::{ConfigError, DirectoryError, PreseedError, Result};
pub use script::ScriptLink;
pub use types::{
    is_safe_value, ClientContext, ClientContextBuilder, OutputMode, RequestParams, ScriptPhase,
};
