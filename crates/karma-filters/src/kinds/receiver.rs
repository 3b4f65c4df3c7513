//! `@receiver` filter.

use std::collections::BTreeMap;

use karma_models::{Alert, Autocomplete};

use crate::error::Result;
use crate::filter::AlertFilter;
use crate::kinds::words;
use crate::matcher::Operator;
use crate::registry::hint;

#[derive(Debug)]
struct ReceiverFilter {
    op: Operator,
    value: String,
}

impl AlertFilter for ReceiverFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        self.op.compare(&alert.receiver, &self.value)
    }
}

pub(crate) fn new_receiver_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    Ok(Box::new(ReceiverFilter {
        op,
        value: value.to_string(),
    }))
}

pub(crate) fn receiver_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = BTreeMap::new();
    for alert in alerts.iter().filter(|a| !a.receiver.is_empty()) {
        for op in operators {
            if op.is_regex() {
                for word in words(&alert.receiver) {
                    let h = hint(name, *op, word, &[word]);
                    hints.insert(h.value.clone(), h);
                }
            } else {
                let h = hint(name, *op, &alert.receiver, &[]);
                hints.insert(h.value.clone(), h);
            }
        }
    }
    hints.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use karma_models::Labels;
    use test_case::test_case;

    #[test_case("@receiver=by-name", true ; "equal")]
    #[test_case("@receiver!=by-name", false ; "not equal")]
    #[test_case("@receiver=~BY", true ; "regex")]
    #[test_case("@receiver!~cluster", true ; "negative regex")]
    fn receiver_matching(expression: &str, expected: bool) {
        let alert = Alert::new(Labels::new(), "by-name", chrono::Utc::now());
        let mut f = Filter::new(expression);
        assert!(f.is_valid());
        assert_eq!(f.matches(&alert, 0), expected);
    }

    #[test]
    fn receiver_rejects_comparisons() {
        assert!(!Filter::new("@receiver>a").is_valid());
    }
}
