//! Comparison operators and the shared regex cache.

use std::num::NonZeroUsize;

use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;

use crate::error::{FilterError, Result};

/// Number of compiled filter regexes kept around.
const REGEX_CACHE_SIZE: usize = 1000;

static REGEX_CACHE: Lazy<Mutex<LruCache<String, Regex>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
    ))
});

/// Compiles `pattern` as an unanchored, case-insensitive regex.
///
/// Compiled regexes are cached process-wide.
pub fn cached_regex(pattern: &str) -> Result<Regex> {
    if let Some(re) = REGEX_CACHE.lock().get(pattern) {
        return Ok(re.clone());
    }
    let re = Regex::new(&format!("(?i){pattern}")).map_err(|e| FilterError::InvalidRegex {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    REGEX_CACHE.lock().put(pattern.to_string(), re.clone());
    Ok(re)
}

/// A filter comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `=~`
    Regex,
    /// `!~`
    NegativeRegex,
}

impl Operator {
    /// Equality and regex operators, the set most string filters accept.
    pub const STRING: &'static [Self] = &[Self::Regex, Self::NegativeRegex, Self::Equal, Self::NotEqual];

    /// Equality operators only.
    pub const EQUALITY: &'static [Self] = &[Self::Equal, Self::NotEqual];

    /// Every operator.
    pub const ALL: &'static [Self] = &[
        Self::Regex,
        Self::NegativeRegex,
        Self::Equal,
        Self::NotEqual,
        Self::LessThan,
        Self::GreaterThan,
    ];

    /// Parses an operator run.
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            "=" => Some(Self::Equal),
            "!=" => Some(Self::NotEqual),
            ">" => Some(Self::GreaterThan),
            "<" => Some(Self::LessThan),
            "=~" => Some(Self::Regex),
            "!~" => Some(Self::NegativeRegex),
            _ => None,
        }
    }

    /// Returns the operator as written.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Regex => "=~",
            Self::NegativeRegex => "!~",
        }
    }

    /// True for `!=` and `!~`.
    pub const fn is_negative(&self) -> bool {
        matches!(self, Self::NotEqual | Self::NegativeRegex)
    }

    /// True for `=~` and `!~`.
    pub const fn is_regex(&self) -> bool {
        matches!(self, Self::Regex | Self::NegativeRegex)
    }

    /// The positive counterpart of a negative operator.
    pub const fn positive(&self) -> Self {
        match self {
            Self::NotEqual => Self::Equal,
            Self::NegativeRegex => Self::Regex,
            other => *other,
        }
    }

    /// Checks that `value` is usable with this operator.
    pub fn validate(&self, value: &str) -> Result<()> {
        if self.is_regex() {
            cached_regex(value)?;
        }
        Ok(())
    }

    /// Compares an alert side `actual` against the filter side `expected`.
    ///
    /// `<` and `>` compare as integers when both sides parse as integers and
    /// as strings otherwise. They are false when either side is empty. A
    /// regex that doesn't compile never matches.
    pub fn compare(&self, actual: &str, expected: &str) -> bool {
        match self {
            Self::Equal => actual == expected,
            Self::NotEqual => actual != expected,
            Self::GreaterThan | Self::LessThan => {
                if actual.is_empty() || expected.is_empty() {
                    return false;
                }
                let ord = match (actual.parse::<i64>(), expected.parse::<i64>()) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => actual.cmp(expected),
                };
                if *self == Self::GreaterThan {
                    ord.is_gt()
                } else {
                    ord.is_lt()
                }
            }
            Self::Regex => cached_regex(expected).is_ok_and(|re| re.is_match(actual)),
            Self::NegativeRegex => !Self::Regex.compare(actual, expected),
        }
    }

    /// Compares a multi-valued alert side.
    ///
    /// Positive operators match when any value matches. Negative operators
    /// match when no value matches their positive counterpart, so an empty
    /// list matches `!=` but never `=`.
    pub fn compare_any<'a, I>(&self, actual: I, expected: &str) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let positive = self.positive();
        let found = actual.into_iter().any(|v| positive.compare(v, expected));
        if self.is_negative() {
            !found
        } else {
            found
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
