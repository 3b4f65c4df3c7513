//! Error types for the karma-models crate.

use thiserror::Error;

/// Errors raised while building model values.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A regular expression failed to compile.
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex {
        /// The pattern as written by the user.
        pattern: String,
        /// The compiler error.
        reason: String,
    },

    /// A color string could not be parsed.
    #[error("invalid color {value:?}")]
    InvalidColor {
        /// The rejected color string.
        value: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
