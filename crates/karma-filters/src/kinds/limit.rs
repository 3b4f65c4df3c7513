//! `@limit=N` caps the number of alerts returned.

use karma_models::{Alert, Autocomplete};

use crate::error::{FilterError, Result};
use crate::filter::AlertFilter;
use crate::matcher::Operator;
use crate::registry::hint;

#[derive(Debug)]
struct LimitFilter {
    limit: usize,
}

impl AlertFilter for LimitFilter {
    fn matches(&self, _alert: &Alert, matches: usize) -> bool {
        matches < self.limit
    }

    fn limit(&self) -> Option<usize> {
        Some(self.limit)
    }
}

pub(crate) fn new_limit_filter(name: &str, _: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    match value.parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(Box::new(LimitFilter { limit })),
        _ => Err(FilterError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer".to_string(),
        }),
    }
}

pub(crate) fn limit_hints(name: &str, operators: &[Operator], _: &[Alert]) -> Vec<Autocomplete> {
    operators
        .iter()
        .flat_map(|op| ["10", "50"].map(|v| hint(name, *op, v, &[])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use karma_models::Labels;
    use test_case::test_case;

    fn alerts(n: usize) -> Vec<Alert> {
        (0..n)
            .map(|i| {
                let labels: Labels = [("i".to_string(), i.to_string())].into();
                Alert::new(labels, "default", chrono::Utc::now())
            })
            .collect()
    }

    #[test_case("@limit=1", 3, 1, 2 ; "one of three")]
    #[test_case("@limit=5", 8, 5, 3 ; "five of eight")]
    #[test_case("@limit=3", 3, 3, 0 ; "exact")]
    fn limits(expression: &str, total: usize, passed: usize, hits: usize) {
        let mut f = Filter::new(expression);
        assert!(f.is_valid());
        assert!(f.limit().is_some());
        let mut matches = 0;
        for a in alerts(total) {
            if f.matches(&a, matches) {
                matches += 1;
            }
        }
        assert_eq!(matches, passed);
        assert_eq!(f.hits(), hits);
    }

    #[test]
    fn first_alert_passes_rest_fail() {
        let mut f = Filter::new("@limit=1");
        let a = alerts(3);
        let got = [f.matches(&a[0], 0), f.matches(&a[1], 1), f.matches(&a[2], 1)];
        assert_eq!(got, [true, false, false]);
        assert_eq!(f.hits(), 2);
    }

    #[test_case("@limit=0" ; "zero")]
    #[test_case("@limit=-1" ; "negative")]
    #[test_case("@limit=abc" ; "not a number")]
    #[test_case("@limit!=5" ; "not equal unsupported")]
    fn invalid(expression: &str) {
        let f = Filter::new(expression);
        assert!(!f.is_valid());
        assert!(f.limit().is_none());
    }

    #[test]
    fn error_message() {
        let err = new_limit_filter("@limit", Operator::Equal, "0").unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"0\" for @limit: must be a positive integer");
    }
}
