//! netpreseed API - HTTP surface of the preseed generator
//!
//! This crate serves installer directives and early/late shell scripts to
//! network-booted installers.
//!
//! # Features
//!
//! - `GET /`, `/preseed`, `/preseed.cfg`: preseed file or script
//! - `?info`: HTML diagnostic page
//! - `GET /health`: liveness check
//! - Request logging and request ids
//!
//! # Example
//!
//! ```no_run
//! use netpreseed_api::ServerBuilder;
//! use netpreseed_core::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = ServerBuilder::new(AppConfig::default()).build()?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod info;
pub mod middleware;
pub mod resolver;
pub mod routes;
pub mod service;

pub use error::{ApiError, ApiResult};
pub use resolver::{ClientResolver, StaticResolver, SystemResolver};
pub use service::{PreseedRequest, PreseedService, Rendered};

use middleware::{logging_middleware, request_id_middleware};
use netpreseed_core::directory::LdapConnector;
use netpreseed_core::{AppConfig, DirectoryConnector};
use netpreseed_plugin_api::{PluginFactoryRegistry, PluginManager};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Router with all routes and middleware.
pub fn create_app(service: PreseedService) -> axum::Router {
    routes::create_router(service).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(axum::middleware::from_fn(logging_middleware)),
    )
}

// ============================================================================
// Server Builder
// ============================================================================

pub struct ServerBuilder {
    config: AppConfig,
    connector: Option<Arc<dyn DirectoryConnector>>,
    resolver: Option<Arc<dyn ClientResolver>>,
    factories: Option<PluginFactoryRegistry>,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            connector: None,
            resolver: None,
            factories: None,
        }
    }

    /// Uses `connector` instead of an LDAP connection.
    pub fn with_connector(mut self, connector: Arc<dyn DirectoryConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Uses `resolver` instead of DNS and ARP.
    pub fn with_resolver(mut self, resolver: Arc<dyn ClientResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Uses `factories` instead of the built-in plugin kinds.
    pub fn with_factories(mut self, factories: PluginFactoryRegistry) -> Self {
        self.factories = Some(factories);
        self
    }

    /// Build the server
    pub fn build(self) -> anyhow::Result<Server> {
        self.config.validate()?;

        let connector: Arc<dyn DirectoryConnector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(LdapConnector::new(self.config.ldap.clone())),
        };
        let resolver: Arc<dyn ClientResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(SystemResolver::new(self.config.resolver.clone())),
        };
        let factories = self
            .factories
            .unwrap_or_else(PluginFactoryRegistry::with_builtins);

        let plugins = PluginManager::new(self.config.plugins.clone(), Arc::new(factories));
        let bind_address = self.config.server.bind_address();
        let service = PreseedService::new(Arc::new(self.config), connector, resolver, plugins);

        Ok(Server {
            bind_address,
            service,
        })
    }
}

// ============================================================================
// Server
// ============================================================================

pub struct Server {
    bind_address: String,
    service: PreseedService,
}

impl Server {
    pub fn service(&self) -> &PreseedService {
        &self.service
    }

    /// Run the server until Ctrl-C or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let config = self.service.config();
        info!(
            address = %local_addr,
            plugin_dir = %config.plugins.directory.display(),
            ldap = %config.ldap.url,
            "Server listening"
        );

        let app = create_app(self.service);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("Server shutdown complete");
        Ok(())
    }
}

// ============================================================================
// Graceful Shutdown
// ============================================================================

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl-C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpreseed_core::StaticDirectory;

    #[test]
    fn test_server_builder() {
        let server = ServerBuilder::new(AppConfig::default())
            .with_connector(Arc::new(StaticDirectory::default()))
            .with_resolver(Arc::new(StaticResolver::new()))
            .build();
        assert!(server.is_ok());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(ServerBuilder::new(config).build().is_err());
    }

    #[test]
    fn test_default_kinds() {
        let server = ServerBuilder::new(AppConfig::default()).build().unwrap();
        assert_eq!(
            server.service().plugins().factories().kinds(),
            vec!["Directives", "LdapDirectives", "Netcfg"]
        );
    }
}
