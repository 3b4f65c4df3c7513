//! Filter definitions keyed by name pattern.
//!
//! Lookup walks the table in order and the first definition whose name
//! pattern matches wins, so synthetic `@` filters must come before the
//! catch-all label filter.

use karma_models::autocomplete::merge_hints;
use karma_models::{Alert, Autocomplete};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Result;
use crate::filter::AlertFilter;
use crate::kinds::{fuzzy, label, limit, receiver, silence, state, upstream};
use crate::matcher::Operator;

/// Builds a filter from a name, a supported operator and a non-empty value.
pub type Factory = fn(&str, Operator, &str) -> Result<Box<dyn AlertFilter>>;

/// Generates hints for a filter from the current alerts.
pub type HintGenerator = fn(&str, &[Operator], &[Alert]) -> Vec<Autocomplete>;

/// One row of the filter table.
#[derive(Debug)]
pub struct FilterDefinition {
    /// Filter name, or the name pattern for label filters.
    pub label: &'static str,
    /// Anchored name pattern.
    pub name_re: Regex,
    /// Accepted operators.
    pub operators: &'static [Operator],
    /// Filter constructor.
    pub factory: Factory,
    /// Hint generator.
    pub autocomplete: Option<HintGenerator>,
}

impl FilterDefinition {
    fn new(
        label: &'static str,
        operators: &'static [Operator],
        factory: Factory,
        autocomplete: Option<HintGenerator>,
    ) -> Self {
        let pattern = if label.starts_with('@') {
            format!("^{label}$")
        } else {
            format!("^{}$", label.trim_start_matches('^').trim_end_matches('$'))
        };
        Self {
            label,
            name_re: Regex::new(&pattern).unwrap_or_else(|_| unreachable!()),
            operators,
            factory,
            autocomplete,
        }
    }
}

const FINGERPRINT_OPERATORS: &[Operator] = &[Operator::Regex, Operator::Equal, Operator::NotEqual];
const AGE_OPERATORS: &[Operator] = &[Operator::LessThan, Operator::GreaterThan];
const EQUAL_ONLY: &[Operator] = &[Operator::Equal];

/// Every keyed filter in lookup order.
pub static DEFINITIONS: Lazy<Vec<FilterDefinition>> = Lazy::new(|| {
    vec![
        FilterDefinition::new(
            "@alertmanager",
            Operator::STRING,
            upstream::new_alertmanager_filter,
            Some(upstream::alertmanager_hints),
        ),
        FilterDefinition::new(
            "@cluster",
            Operator::STRING,
            upstream::new_cluster_filter,
            Some(upstream::cluster_hints),
        ),
        FilterDefinition::new("@state", Operator::EQUALITY, state::new_state_filter, Some(state::state_hints)),
        FilterDefinition::new(
            "@fingerprint",
            FINGERPRINT_OPERATORS,
            upstream::new_fingerprint_filter,
            Some(upstream::fingerprint_hints),
        ),
        FilterDefinition::new(
            "@receiver",
            Operator::STRING,
            receiver::new_receiver_filter,
            Some(receiver::receiver_hints),
        ),
        FilterDefinition::new("@age", AGE_OPERATORS, state::new_age_filter, Some(state::age_hints)),
        FilterDefinition::new(
            "@silence_id",
            Operator::EQUALITY,
            silence::new_silence_id_filter,
            Some(silence::silence_id_hints),
        ),
        FilterDefinition::new(
            "@silence_ticket",
            Operator::STRING,
            silence::new_silence_ticket_filter,
            Some(silence::silence_ticket_hints),
        ),
        FilterDefinition::new(
            "@silence_author",
            Operator::STRING,
            silence::new_silence_author_filter,
            Some(silence::silence_author_hints),
        ),
        FilterDefinition::new("@limit", EQUAL_ONLY, limit::new_limit_filter, Some(limit::limit_hints)),
        FilterDefinition::new(
            "@inhibited",
            EQUAL_ONLY,
            state::new_inhibited_filter,
            Some(state::inhibited_hints),
        ),
        FilterDefinition::new(
            "@silenced_by",
            Operator::EQUALITY,
            silence::new_silenced_by_filter,
            Some(silence::silenced_by_hints),
        ),
        FilterDefinition::new(
            "@inhibited_by",
            Operator::EQUALITY,
            silence::new_inhibited_by_filter,
            Some(silence::inhibited_by_hints),
        ),
        FilterDefinition::new(
            "[a-zA-Z_][a-zA-Z0-9_]*",
            Operator::ALL,
            label::new_label_filter,
            Some(label::label_hints),
        ),
    ]
});

/// Fallback for expressions without a name and operator.
pub static FUZZY: Lazy<FilterDefinition> =
    Lazy::new(|| FilterDefinition::new("@fuzzy", &[Operator::Regex], fuzzy::new_fuzzy_filter, None));

/// Finds the definition handling `name`.
pub fn lookup(name: &str) -> Option<&'static FilterDefinition> {
    DEFINITIONS.iter().find(|d| d.name_re.is_match(name))
}

/// Builds the merged hint list for `alerts`.
pub fn build_autocomplete(alerts: &[Alert]) -> Vec<Autocomplete> {
    merge_hints(DEFINITIONS.iter().filter_map(|d| {
        d.autocomplete
            .map(|generate| generate(d.label, d.operators, alerts))
    }))
}

/// Builds a hint for `name op value`.
pub(crate) fn hint(name: &str, op: Operator, value: &str, extra: &[&str]) -> Autocomplete {
    let mut tokens = vec![name.to_string()];
    let bare = name.trim_start_matches('@');
    if bare != name {
        tokens.push(bare.to_string());
    }
    tokens.push(format!("{name}{op}"));
    tokens.extend(extra.iter().map(ToString::to_string));
    Autocomplete::new(format!("{name}{op}{value}"), tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use karma_models::{AlertState, AlertmanagerInstance, Labels, Silence};
    use test_case::test_case;

    #[test_case("@alertmanager", "@alertmanager" ; "alertmanager")]
    #[test_case("@silence_author", "@silence_author" ; "silence author")]
    #[test_case("instance", "[a-zA-Z_][a-zA-Z0-9_]*" ; "plain label")]
    fn lookup_picks_definition(name: &str, expected: &str) {
        assert_eq!(lookup(name).map(|d| d.label), Some(expected));
    }

    #[test]
    fn lookup_rejects_unknown_synthetic_names() {
        assert!(lookup("@nope").is_none());
    }

    fn sample_alerts() -> Vec<Alert> {
        let labels = |pairs: &[(&str, &str)]| -> Labels {
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect()
        };
        let mut first = Alert::new(labels(&[("foo", "bar"), ("number", "1")]), "default", chrono::Utc::now());
        first.alertmanager = vec![
            AlertmanagerInstance {
                name: "am1".to_string(),
                state: AlertState::Active,
                ..Default::default()
            },
            AlertmanagerInstance {
                name: "am2".to_string(),
                state: AlertState::Active,
                ..Default::default()
            },
        ];

        let mut second = Alert::new(
            labels(&[("foo", "bar baz"), ("number", "5")]),
            "not default",
            chrono::Utc::now(),
        );
        second.alertmanager = vec![
            AlertmanagerInstance {
                name: "am1".to_string(),
                state: AlertState::Suppressed,
                ..Default::default()
            },
            AlertmanagerInstance {
                name: "am2".to_string(),
                state: AlertState::Suppressed,
                silenced_by: vec!["1234567890".to_string()],
                silences: vec![Silence {
                    id: "1234567890".to_string(),
                    created_by: "me@example.com".to_string(),
                    ticket_id: "JIRA-1".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        ];
        vec![first, second]
    }

    #[test]
    fn fixed_hints_without_alerts() {
        let values: Vec<String> = build_autocomplete(&[]).into_iter().map(|h| h.value).collect();
        assert_eq!(
            values,
            vec![
                "@age<10m",
                "@age<1h",
                "@age>10m",
                "@age>1h",
                "@inhibited=false",
                "@inhibited=true",
                "@limit=10",
                "@limit=50",
            ]
        );
    }

    #[test]
    fn hints_cover_every_kind() {
        let values: Vec<String> = build_autocomplete(&sample_alerts())
            .into_iter()
            .map(|h| h.value)
            .collect();
        for expected in [
            "@alertmanager!=am1",
            "@alertmanager=am2",
            "@receiver=not default",
            "@receiver=~not",
            "@receiver!~default",
            "@silence_author=~me@example.com",
            "@silence_id=1234567890",
            "@silence_ticket!=JIRA-1",
            "@silenced_by=1234567890",
            "@state=active",
            "@state!=suppressed",
            "foo=bar baz",
            "foo!~baz",
            "number<5",
            "number>1",
        ] {
            assert!(values.iter().any(|v| v == expected), "missing hint {expected}");
        }
        assert!(!values.iter().any(|v| v.starts_with("@cluster")));
        assert!(!values.iter().any(|v| v == "foo=~bar baz"));
        assert!(!values.iter().any(|v| v == "foo<bar"));
    }

    #[test]
    fn hint_tokens() {
        let h = hint("@receiver", Operator::Equal, "default", &["default"]);
        assert_eq!(h.value, "@receiver=default");
        assert_eq!(h.tokens, vec!["@receiver", "receiver", "@receiver=", "default"]);
    }
}
