use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use netpreseed_core::DirectoryError;
use netpreseed_plugin_api::PluginError;
use thiserror::Error;
use tracing::{error, warn};

/// Failures that end a preseed request.
///
/// The installer reads the body as a preseed file or shell script, so every
/// error renders as a single comment line.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("LDAP Error {0}")]
    Directory(#[from] DirectoryError),

    #[error("Plugin Error {0}")]
    Plugin(#[from] PluginError),

    #[error("Bad Request {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Directory(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Plugin(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The response body: `# <error>` and a newline.
    pub fn body(&self) -> String {
        format!("# {}\n", self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Preseed request failed");
        } else {
            warn!(error = %self, "Preseed request rejected");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.body(),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_lines() {
        let err = ApiError::from(DirectoryError::connect("Can't contact LDAP server"));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.body(), "# LDAP Error Can't contact LDAP server\n");

        let err = ApiError::from(PluginError::Execution("boom".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), "# Plugin Error Plugin execution error: boom\n");
    }
}
