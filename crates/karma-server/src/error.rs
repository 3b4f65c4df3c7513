//! Error types for the karma server.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors raised by the server, from startup to individual requests.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration. Fatal at startup.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// Failed to bind the listener.
    #[error("failed to bind to {addr}: {source}")]
    BindFailed {
        /// Requested address.
        addr: std::net::SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Malformed request.
    #[error("{0}")]
    InvalidRequest(String),

    /// Missing or wrong credentials.
    #[error("access denied")]
    Unauthorized {
        /// Ask the browser for basic auth credentials.
        basic: bool,
    },

    /// A silence ACL rule rejected the request.
    #[error("silence blocked by ACL rule: {reason}")]
    AclBlocked {
        /// Reason configured on the rule.
        reason: String,
    },

    /// Forwarding to an upstream failed.
    #[error("proxy request to {alertmanager} failed: {reason}")]
    Proxy {
        /// Upstream name.
        alertmanager: String,
        /// What went wrong.
        reason: String,
    },

    /// A history query could not be served.
    #[error("history query failed: {0}")]
    History(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized { basic } => {
                let mut response = (StatusCode::UNAUTHORIZED, "Access denied\n").into_response();
                if *basic {
                    response.headers_mut().insert(
                        header::WWW_AUTHENTICATE,
                        header::HeaderValue::from_static(r#"Basic realm="karma""#),
                    );
                }
                return response;
            }
            Self::InvalidRequest(_) | Self::AclBlocked { .. } | Self::History(_) => StatusCode::BAD_REQUEST,
            Self::Proxy { .. } => StatusCode::BAD_GATEWAY,
            Self::Config { .. } | Self::BindFailed { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.to_string(),
        };
        let json = serde_json::to_string(&body)
            .unwrap_or_else(|_| r#"{"error":"failed to serialize error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], json).into_response()
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<karma_upstream::UpstreamError> for ServerError {
    fn from(err: karma_upstream::UpstreamError) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}
