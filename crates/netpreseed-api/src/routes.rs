//! HTTP routes.

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use netpreseed_core::AppConfig;
use std::net::{IpAddr, SocketAddr};
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::service::{PreseedRequest, PreseedService, Rendered};

/// Routes served by the preseed endpoint.
pub fn create_router(service: PreseedService) -> Router {
    Router::new()
        .route("/", get(preseed))
        .route("/preseed", get(preseed))
        .route("/preseed.cfg", get(preseed))
        .route("/health", get(health_check))
        .with_state(service)
}

async fn preseed(
    State(service): State<PreseedService>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<Rendered> {
    let config = service.config();
    let request = PreseedRequest {
        remote_ip: client_ip(&headers, addr, config.server.trust_forwarded_for),
        query: uri.query().unwrap_or("").to_string(),
        base_url: base_url(config, &headers, &uri)?,
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
    };

    service.handle(request).await
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
    }))
}

/// Address of the installer: the peer, or the first `X-Forwarded-For`
/// entry behind a trusted proxy.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_forwarded_for: bool) -> IpAddr {
    let forwarded = trust_forwarded_for
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded.unwrap_or_else(|| peer.ip()).to_canonical()
}

/// URL the generated commands call back: `server.public_url`, or the
/// request's own host and path.
pub fn base_url(config: &AppConfig, headers: &HeaderMap, uri: &Uri) -> ApiResult<Url> {
    if let Some(ref public_url) = config.server.public_url {
        return Url::parse(public_url)
            .map_err(|e| ApiError::BadRequest(format!("invalid public_url: {}", e)));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest("missing Host header".to_string()))?;

    Url::parse(&format!("http://{}{}", host, uri.path()))
        .map_err(|e| ApiError::BadRequest(format!("invalid Host header: {}", e)))
}
