//! Filter expression parsing.
//!
//! A keyed expression is `NAME OP VALUE`. The operator is the longest run of
//! `=!<>~` after the name, so `a===b` yields the operator `===` and is
//! rejected later. Anything that doesn't start with a name and an operator
//! is a fuzzy expression.

use once_cell::sync::Lazy;
use regex::Regex;

static EXPRESSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<name>@?[a-zA-Z_][a-zA-Z0-9_]*)(?P<operator>[=!<>~]+)(?P<value>.*)$")
        .unwrap_or_else(|_| unreachable!())
});

/// The pieces of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// `NAME OP VALUE`. The operator is unvalidated.
    Keyed {
        /// Filter name, with the `@` prefix if present.
        name: String,
        /// Operator run as written.
        operator: String,
        /// Everything after the operator.
        value: String,
    },
    /// Free text matched against label values, annotations and silence comments.
    Fuzzy(String),
}

/// Trims spaces and tabs from both ends.
pub fn trim_expression(expression: &str) -> &str {
    expression.trim_matches(|c| c == ' ' || c == '\t')
}

/// Splits an already trimmed, non-empty expression.
pub fn parse_expression(trimmed: &str) -> Expression {
    match EXPRESSION_REGEX.captures(trimmed) {
        Some(caps) => Expression::Keyed {
            name: caps["name"].to_string(),
            operator: caps["operator"].to_string(),
            value: caps["value"].to_string(),
        },
        None => Expression::Fuzzy(trimmed.to_string()),
    }
}
