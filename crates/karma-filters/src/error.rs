//! Error types for the karma-filters crate.

use thiserror::Error;

/// Reasons a filter expression is rejected.
///
/// These never fail a request. They only mark the filter as invalid in the
/// response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Empty or whitespace-only expression.
    #[error("empty filter expression")]
    Empty,

    /// A `name op` expression without a value.
    #[error("missing value in {expression:?}")]
    MissingValue {
        /// The rejected expression.
        expression: String,
    },

    /// Operator run that is not one of the known operators.
    #[error("unknown operator {operator:?}")]
    UnknownOperator {
        /// Operator as written.
        operator: String,
    },

    /// Known operator that the filter doesn't support.
    #[error("operator {operator:?} is not supported by {name}")]
    UnsupportedOperator {
        /// Filter name.
        name: String,
        /// Operator as written.
        operator: String,
    },

    /// No filter accepts this name.
    #[error("unknown filter {name:?}")]
    UnknownFilter {
        /// Filter name.
        name: String,
    },

    /// Value that the filter can't use.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        /// Filter name.
        name: String,
        /// Value as written.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Value used with a regex operator that doesn't compile.
    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex {
        /// Pattern as written.
        pattern: String,
        /// The compiler error.
        reason: String,
    },
}

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
