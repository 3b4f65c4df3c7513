//! Anchored regular expressions.
//!
//! Silence matchers, keep/strip lists, ACL rules and rewrite rules all match
//! the full input, so every user supplied pattern is wrapped in `^(?:...)$`.

use regex::Regex;

use crate::error::{ModelError, Result};

/// Compiles `pattern` so it must match the whole input.
pub fn compile_anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ModelError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Compiles every pattern with [`compile_anchored`].
pub fn compile_anchored_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns.iter().map(|p| compile_anchored(p)).collect()
}

/// Returns true if any of the regexes matches `value`.
pub fn matches_any(value: &str, regexes: &[Regex]) -> bool {
    regexes.iter().any(|re| re.is_match(value))
}
