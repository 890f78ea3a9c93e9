//! Structured errors for the swcache host.
//!
//! Every error renders as JSON `{"error": CODE, "message": ...}` with a
//! status derived from its kind.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use swcache_core::{ConfigError, Error};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Malformed request to a control endpoint.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Forwarding a pass-through request to the origin failed.
    #[error("BAD_GATEWAY: {0}")]
    BadGateway(String),

    #[error(transparent)]
    Engine(#[from] Error),

    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),
}

impl HostError {
    fn status(&self) -> StatusCode {
        match self {
            HostError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            HostError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            HostError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HostError::Engine(err) => match err {
                Error::InvalidInput(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                Error::Network(_) | Error::HttpStatus(_) | Error::FetchTooLarge(_) => StatusCode::BAD_GATEWAY,
                Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                Error::InvalidState(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// The upper-case code that prefixes the display string.
    fn code(&self) -> String {
        let text = self.to_string();
        text.split_once(':').map_or(text.clone(), |(code, _)| code.to_string())
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.code(), "message": self.to_string() }))).into_response()
    }
}
