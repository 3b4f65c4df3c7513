//! Filter autocomplete hints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One suggested filter expression and the tokens it can be found by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autocomplete {
    /// The filter expression, e.g. `job=node`.
    pub value: String,
    /// Search tokens, e.g. `["job", "node"]`.
    pub tokens: Vec<String>,
}

impl Autocomplete {
    /// Creates a hint.
    pub fn new(value: impl Into<String>, tokens: Vec<String>) -> Self {
        Self {
            value: value.into(),
            tokens,
        }
    }

    /// Case-insensitive prefix match against the value or any token.
    pub fn matches_prefix(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.value.to_lowercase().starts_with(&term)
            || self.tokens.iter().any(|t| t.to_lowercase().starts_with(&term))
    }
}

/// Unions hint lists by value, extending token lists with unseen tokens.
///
/// The result is ordered by value.
pub fn merge_hints<I>(lists: I) -> Vec<Autocomplete>
where
    I: IntoIterator<Item = Vec<Autocomplete>>,
{
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for hint in lists.into_iter().flatten() {
        let tokens = merged.entry(hint.value).or_default();
        for token in hint.tokens {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    merged
        .into_iter()
        .map(|(value, tokens)| Autocomplete { value, tokens })
        .collect()
}
