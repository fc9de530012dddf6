//! The preseed pipeline, independent of the HTTP layer.
//!
//! resolve client → info page, or: connect directory → class lookup →
//! load plugins → lifecycle → text. The directory session is closed on every
//! path once it was opened.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use netpreseed_core::directory::lookup_classes;
use netpreseed_core::{
    AppConfig, ClientContext, ClientContextBuilder, Directory, DirectoryConnector, RequestParams,
    ScriptLink,
};
use netpreseed_plugin_api::{LifecycleDriver, Output, PluginManager};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::info::InfoPage;
use crate::resolver::ClientResolver;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// One incoming preseed request.
#[derive(Debug, Clone)]
pub struct PreseedRequest {
    pub remote_ip: IpAddr,
    /// Raw query string, without `?`
    pub query: String,
    /// URL the installer should call back for scripts
    pub base_url: Url,
    /// Request headers shown on the info page
    pub headers: Vec<(String, String)>,
}

/// A successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub content_type: &'static str,
    pub body: String,
}

impl Rendered {
    pub fn text(body: String) -> Self {
        Self {
            content_type: TEXT_PLAIN,
            body,
        }
    }

    pub fn html(body: String) -> Self {
        Self {
            content_type: TEXT_HTML,
            body,
        }
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, self.content_type)],
            self.body,
        )
            .into_response()
    }
}

/// Shared state of the preseed endpoint.
#[derive(Clone)]
pub struct PreseedService {
    config: Arc<AppConfig>,
    connector: Arc<dyn DirectoryConnector>,
    resolver: Arc<dyn ClientResolver>,
    plugins: PluginManager,
}

impl PreseedService {
    pub fn new(
        config: Arc<AppConfig>,
        connector: Arc<dyn DirectoryConnector>,
        resolver: Arc<dyn ClientResolver>,
        plugins: PluginManager,
    ) -> Self {
        Self {
            config,
            connector,
            resolver,
            plugins,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Runs the whole pipeline for one request.
    pub async fn handle(&self, request: PreseedRequest) -> ApiResult<Rendered> {
        let params = RequestParams::parse(&request.query);
        info!(
            remote_ip = %request.remote_ip,
            mode = ?params.output_mode(),
            plugin = ?params.plugin,
            version = ?params.version,
            "Preseed request"
        );

        let builder = self.resolve_client(request.remote_ip, &params).await;

        if params.info {
            return self.info_page(builder.build(), &params, request.headers);
        }

        let directory = self.connector.connect().await?;
        let result = self
            .render(directory.clone(), builder, &params, request.base_url)
            .await;
        if let Err(e) = directory.close().await {
            warn!(error = %e, "Closing directory session failed");
        }
        result
    }

    async fn resolve_client(&self, ip: IpAddr, params: &RequestParams) -> ClientContextBuilder {
        let (reverse_name, hardware_address) = tokio::join!(
            self.resolver.reverse_name(ip),
            self.resolver.hardware_address(ip)
        );
        debug!(
            ip = %ip,
            reverse_name = ?reverse_name,
            hardware_address = ?hardware_address,
            "Client resolved"
        );

        ClientContext::builder(ip)
            .reverse_name(reverse_name)
            .hardware_address(hardware_address)
            .apply_params(params)
    }

    async fn render(
        &self,
        directory: Arc<dyn Directory>,
        builder: ClientContextBuilder,
        params: &RequestParams,
        base_url: Url,
    ) -> ApiResult<Rendered> {
        let lookup_name = builder.lookup_name();
        let classes = lookup_classes(directory.as_ref(), &self.config.ldap, &lookup_name).await?;
        let client = Arc::new(builder.extend_classes(classes).build());
        info!(client = %client.name, classes = ?client.classes, "Client classes");

        let mut plugins = self
            .plugins
            .load(params.plugin.as_deref(), directory, client.clone())
            .await?;
        debug!(plugins = ?plugins, "Plugins loaded");

        let driver = LifecycleDriver::new(params.output_mode(), client, ScriptLink::new(base_url))
            .plugin_filter(params.plugin.clone());
        let mut out = Output::new();
        driver.run(&mut plugins, &mut out).await?;

        Ok(Rendered::text(out.render()))
    }

    fn info_page(
        &self,
        client: ClientContext,
        params: &RequestParams,
        headers: Vec<(String, String)>,
    ) -> ApiResult<Rendered> {
        let plugins = self.plugins.discover(params.plugin.as_deref())?;
        let kinds = self.plugins.factories().kinds();
        let page = InfoPage {
            client: &client,
            params,
            plugins: &plugins,
            kinds: &kinds,
            request_headers: headers,
        };
        Ok(Rendered::html(page.render()))
    }
}
