//! Free text search over label values, annotation values and silence comments.

use karma_models::Alert;
use regex::Regex;

use crate::error::Result;
use crate::filter::AlertFilter;
use crate::matcher::{cached_regex, Operator};

#[derive(Debug)]
struct FuzzyFilter {
    re: Regex,
}

impl AlertFilter for FuzzyFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        alert.labels.values().any(|v| self.re.is_match(v))
            || alert.annotations.iter().any(|a| self.re.is_match(&a.value))
            || alert
                .alertmanager
                .iter()
                .flat_map(|am| am.silences.iter())
                .any(|s| self.re.is_match(&s.comment))
    }
}

pub(crate) fn new_fuzzy_filter(_: &str, _: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    Ok(Box::new(FuzzyFilter {
        re: cached_regex(value)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use karma_models::{AlertmanagerInstance, Annotation, Labels, Silence};
    use test_case::test_case;

    fn alert() -> Alert {
        let labels: Labels = [("instance".to_string(), "web-01.example.com".to_string())].into();
        let mut a = Alert::new(labels, "default", chrono::Utc::now());
        a.annotations = vec![Annotation {
            name: "summary".to_string(),
            value: "Disk almost full".to_string(),
            visible: true,
            is_link: false,
            is_action: false,
        }];
        a.alertmanager = vec![AlertmanagerInstance {
            name: "am1".to_string(),
            silences: vec![Silence {
                id: "1".to_string(),
                comment: "Planned reboot".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }];
        a
    }

    #[test_case("web-01" ; "label value")]
    #[test_case("DISK" ; "annotation value")]
    #[test_case("reboot" ; "silence comment")]
    #[test_case("full$" ; "regex")]
    fn matches(expression: &str) {
        let mut f = Filter::new(expression);
        assert!(f.is_valid());
        assert_eq!(f.operator(), "=~");
        assert!(f.matches(&alert(), 0));
    }

    #[test_case("instance" ; "label names are not searched")]
    #[test_case("summary" ; "annotation names are not searched")]
    #[test_case("nothing" ; "no match")]
    fn misses(expression: &str) {
        assert!(!Filter::new(expression).matches(&alert(), 0));
    }

    #[test]
    fn broken_regex_is_invalid() {
        assert!(!Filter::new("((").is_valid());
    }
}
