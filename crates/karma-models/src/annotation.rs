//! Alert annotations and their presentation rules.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single alert annotation as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Annotation name.
    pub name: String,
    /// Annotation value.
    pub value: String,
    /// Whether the annotation is shown by default.
    pub visible: bool,
    /// True if the value is an http, https or ftp URL.
    pub is_link: bool,
    /// True if the name is listed as an action annotation.
    pub is_action: bool,
}

/// Presentation rules applied when turning raw annotations into [`Annotation`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRules {
    /// Hide annotations unless they are explicitly visible.
    pub default_hidden: bool,
    /// Names that are always hidden.
    pub hidden: Vec<String>,
    /// Names that are always visible.
    pub visible: Vec<String>,
    /// Names placed first, in this order.
    pub order: Vec<String>,
    /// Names rendered as actions.
    pub actions: Vec<String>,
}

impl AnnotationRules {
    /// Whether an annotation with this name is visible.
    pub fn is_visible(&self, name: &str) -> bool {
        if self.visible.iter().any(|n| n == name) {
            return true;
        }
        if self.hidden.iter().any(|n| n == name) {
            return false;
        }
        !self.default_hidden
    }

    /// Whether an annotation with this name is an action.
    pub fn is_action(&self, name: &str) -> bool {
        self.actions.iter().any(|n| n == name)
    }

    /// Builds the ordered annotation list for a raw name/value map.
    ///
    /// Names listed in `order` come first in config order, the rest follow
    /// sorted by name.
    pub fn build(&self, raw: &HashMap<String, String>) -> Vec<Annotation> {
        let mut annotations: Vec<Annotation> = raw
            .iter()
            .map(|(name, value)| Annotation {
                name: name.clone(),
                value: value.clone(),
                visible: self.is_visible(name),
                is_link: is_link(value),
                is_action: self.is_action(name),
            })
            .collect();
        annotations.sort_by(|a, b| {
            let pa = self.order.iter().position(|n| *n == a.name);
            let pb = self.order.iter().position(|n| *n == b.name);
            match (pa, pb) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.name.cmp(&b.name),
            }
        });
        annotations
    }
}

/// Returns true if `value` is a single absolute http, https or ftp URL.
pub fn is_link(value: &str) -> bool {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return false;
    }
    url::Url::parse(value)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https" | "ftp") && u.has_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test_case("http://localhost", true ; "http")]
    #[test_case("https://example.com/graph?x=1", true ; "https with query")]
    #[test_case("ftp://files.example.com/a", true ; "ftp")]
    #[test_case("file:///etc/passwd", false ; "file scheme")]
    #[test_case("see http://x.com", false ; "embedded in text")]
    #[test_case("localhost:9093", false ; "no scheme")]
    #[test_case("", false ; "empty")]
    fn link_detection(value: &str, expected: bool) {
        assert_eq!(is_link(value), expected);
    }

    mod visibility_tests {
        use super::*;

        #[test]
        fn visible_by_default() {
            let rules = AnnotationRules::default();
            assert!(rules.is_visible("summary"));
        }

        #[test]
        fn hidden_list_hides() {
            let rules = AnnotationRules {
                hidden: vec!["summary".to_string()],
                ..Default::default()
            };
            assert!(!rules.is_visible("summary"));
            assert!(rules.is_visible("help"));
        }

        #[test]
        fn visible_list_wins_over_default_hidden() {
            let rules = AnnotationRules {
                default_hidden: true,
                visible: vec!["summary".to_string()],
                hidden: vec!["summary".to_string()],
                ..Default::default()
            };
            assert!(rules.is_visible("summary"));
            assert!(!rules.is_visible("help"));
        }
    }

    #[test]
    fn build_orders_configured_names_first() {
        let rules = AnnotationRules {
            order: vec!["zeta".to_string(), "beta".to_string()],
            actions: vec!["runbook".to_string()],
            ..Default::default()
        };
        let annotations = rules.build(&raw(&[
            ("alpha", "1"),
            ("beta", "2"),
            ("runbook", "https://runbook.example.com"),
            ("zeta", "3"),
        ]));
        let names: Vec<&str> = annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "beta", "alpha", "runbook"]);

        let runbook = &annotations[3];
        assert!(runbook.is_link);
        assert!(runbook.is_action);
        assert!(!annotations[0].is_action);
    }
}
