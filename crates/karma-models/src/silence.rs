//! Silences as reflected from upstream Alertmanagers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Labels;
use crate::regex_util::compile_anchored;

fn default_true() -> bool {
    true
}

/// A single silence matcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SilenceMatcher {
    /// Label name.
    pub name: String,
    /// Literal value or regex.
    pub value: String,
    /// Whether `value` is a regex.
    #[serde(default)]
    pub is_regex: bool,
    /// `false` negates the match.
    #[serde(default = "default_true")]
    pub is_equal: bool,
}

impl SilenceMatcher {
    /// Creates an equality matcher.
    pub fn equal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: false,
            is_equal: true,
        }
    }

    /// Creates a regex matcher.
    pub fn regex(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_regex: true,
            is_equal: true,
        }
    }

    /// Returns a copy of this matcher with `is_equal` flipped.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.is_equal = !self.is_equal;
        self
    }

    /// Whether this matcher matches the given label set.
    ///
    /// A missing label is treated as an empty value. Regexes are anchored and
    /// case-sensitive; an invalid regex never matches.
    pub fn is_match(&self, labels: &Labels) -> bool {
        let value = labels.get(&self.name).map_or("", String::as_str);
        let matched = if self.is_regex {
            match compile_anchored(&self.value) {
                Ok(re) => re.is_match(value),
                Err(_) => return false,
            }
        } else {
            value == self.value
        };
        matched == self.is_equal
    }
}

/// A silence owned by an upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Silence {
    /// Silence ID, unique within a cluster.
    #[serde(default)]
    pub id: String,
    /// Matchers, all of which must match.
    #[serde(default)]
    pub matchers: Vec<SilenceMatcher>,
    /// Start of the silence.
    pub starts_at: DateTime<Utc>,
    /// End of the silence.
    pub ends_at: DateTime<Utc>,
    /// Creation (or last update) time.
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    /// Author.
    #[serde(default)]
    pub created_by: String,
    /// Free-form comment.
    #[serde(default)]
    pub comment: String,
    /// Ticket ID detected in the comment.
    #[serde(default, rename = "ticketID")]
    pub ticket_id: String,
    /// Ticket URL built from the detected ticket ID.
    #[serde(default, rename = "ticketURL")]
    pub ticket_url: String,
}

impl Silence {
    /// Whether every matcher matches. A silence without matchers matches anything.
    pub fn is_match(&self, labels: &Labels) -> bool {
        self.matchers.iter().all(|m| m.is_match(labels))
    }

    /// Whether the silence has ended at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.ends_at < now
    }
}

/// A silence decorated for the silences endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedSilence {
    /// Cluster that owns the silence.
    pub cluster: String,
    /// Number of alerts currently silenced by it.
    pub alert_count: usize,
    /// True once `endsAt` is in the past.
    pub is_expired: bool,
    /// The silence itself.
    pub silence: Silence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test_case(SilenceMatcher::equal("job", "node"), true ; "equal match")]
    #[test_case(SilenceMatcher::equal("job", "nod"), false ; "equal mismatch")]
    #[test_case(SilenceMatcher::equal("job", "node").negated(), false ; "not equal")]
    #[test_case(SilenceMatcher::regex("job", "no.*"), true ; "regex match")]
    #[test_case(SilenceMatcher::regex("job", "od"), false ; "regex is anchored")]
    #[test_case(SilenceMatcher::regex("job", "NODE"), false ; "regex is case sensitive")]
    #[test_case(SilenceMatcher::regex("job", "xx").negated(), true ; "regex negated")]
    #[test_case(SilenceMatcher::equal("missing", ""), true ; "missing label is empty")]
    #[test_case(SilenceMatcher::regex("job", "(("), false ; "invalid regex never matches")]
    fn matcher_is_match(matcher: SilenceMatcher, expected: bool) {
        assert_eq!(matcher.is_match(&labels(&[("job", "node")])), expected);
    }

    #[test]
    fn empty_silence_matches_everything() {
        let silence = Silence::default();
        assert!(silence.is_match(&labels(&[("a", "b")])));
        assert!(silence.is_match(&Labels::new()));
    }

    #[test]
    fn silence_requires_all_matchers() {
        let silence = Silence {
            matchers: vec![
                SilenceMatcher::equal("job", "node"),
                SilenceMatcher::equal("instance", "a"),
            ],
            ..Default::default()
        };
        assert!(silence.is_match(&labels(&[("job", "node"), ("instance", "a")])));
        assert!(!silence.is_match(&labels(&[("job", "node"), ("instance", "b")])));
    }

    #[test]
    fn is_equal_defaults_to_true() {
        let m: SilenceMatcher =
            serde_json::from_str(r#"{"name":"a","value":"b","isRegex":false}"#).unwrap();
        assert!(m.is_equal);
    }

    #[test]
    fn ticket_fields_use_upper_case_names() {
        let silence = Silence {
            ticket_id: "PROJ-1".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&silence).unwrap();
        assert_eq!(json["ticketID"], "PROJ-1");
        assert_eq!(json["ticketURL"], "");
    }

    proptest! {
        #[test]
        fn anchored_regex_matches_whole_value(v in "[a-c]{0,4}") {
            let silence = Silence {
                matchers: vec![SilenceMatcher::regex("k", "a.b")],
                ..Default::default()
            };
            let expected = v.len() == 3 && v.starts_with('a') && v.ends_with('b');
            prop_assert_eq!(silence.is_match(&labels(&[("k", v.as_str())])), expected);
        }

        #[test]
        fn silence_is_conjunction(a in "[xy]", b in "[xy]") {
            let m1 = SilenceMatcher::equal("a", "x");
            let m2 = SilenceMatcher::equal("b", "x");
            let l = labels(&[("a", a.as_str()), ("b", b.as_str())]);
            let silence = Silence { matchers: vec![m1.clone(), m2.clone()], ..Default::default() };
            prop_assert_eq!(silence.is_match(&l), m1.is_match(&l) && m2.is_match(&l));
        }
    }
}
