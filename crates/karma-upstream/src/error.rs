//! Error types for the karma-upstream crate.

use thiserror::Error;

/// Errors raised while talking to an Alertmanager or building upstreams.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request to an upstream endpoint failed.
    #[error("{endpoint} request to {uri} failed: {reason}")]
    Fetch {
        /// Which endpoint was queried (`status`, `alerts`, `silences`).
        endpoint: &'static str,
        /// Request URI with credentials masked.
        uri: String,
        /// Transport or HTTP error.
        reason: String,
    },

    /// The upstream answered with a body the mapper couldn't decode.
    #[error("failed to decode {endpoint} response: {reason}")]
    Parse {
        /// Which endpoint was queried.
        endpoint: &'static str,
        /// Decoder error.
        reason: String,
    },

    /// Invalid upstream or transform configuration.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What is wrong.
        reason: String,
    },

    /// Two upstreams share a name.
    #[error("alertmanager upstream {name:?} is configured more than once")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl UpstreamError {
    /// Label value used for the per-endpoint error counter.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Fetch { endpoint, .. } | Self::Parse { endpoint, .. } => Some(*endpoint),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for UpstreamError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<karma_models::ModelError> for UpstreamError {
    fn from(err: karma_models::ModelError) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}

/// Result type for upstream operations.
pub type Result<T> = std::result::Result<T, UpstreamError>;
