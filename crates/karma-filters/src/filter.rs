//! Parsed filters.

use std::fmt;

use karma_models::api::ApiFilter;
use karma_models::{Alert, AlertmanagerInstance};
use tracing::trace;

use crate::error::FilterError;
use crate::matcher::Operator;
use crate::parser::{parse_expression, trim_expression, Expression};
use crate::registry::{lookup, FUZZY};

/// Matching logic of one filter kind.
///
/// Implementations are built by the registry factories from an already
/// validated operator and value, so matching never fails.
pub trait AlertFilter: Send + Sync + fmt::Debug {
    /// Whether `alert` passes. `matches` is the number of alerts that passed
    /// every filter so far.
    fn matches(&self, alert: &Alert, matches: usize) -> bool;

    /// Whether the filter applies to individual upstream observations.
    fn is_alertmanager_filter(&self) -> bool {
        false
    }

    /// Whether a single observation passes. Only consulted for
    /// alertmanager filters.
    fn matches_alertmanager(&self, _am: &AlertmanagerInstance) -> bool {
        true
    }

    /// The limit for `@limit` filters.
    fn limit(&self) -> Option<usize> {
        None
    }
}

/// A filter built from one user expression.
#[derive(Debug)]
pub struct Filter {
    raw_text: String,
    name: String,
    operator: String,
    value: String,
    hits: usize,
    inner: Result<Box<dyn AlertFilter>, FilterError>,
}

impl Filter {
    /// Parses `expression`. Invalid expressions still produce a filter so
    /// they can be reported back.
    pub fn new(expression: &str) -> Self {
        let trimmed = trim_expression(expression);
        let mut filter = Self {
            raw_text: trimmed.to_string(),
            name: String::new(),
            operator: String::new(),
            value: trimmed.to_string(),
            hits: 0,
            inner: Err(FilterError::Empty),
        };
        if trimmed.is_empty() {
            return filter;
        }

        match parse_expression(trimmed) {
            Expression::Fuzzy(text) => {
                filter.operator = Operator::Regex.as_str().to_string();
                filter.inner = (FUZZY.factory)("", Operator::Regex, &text);
            }
            Expression::Keyed { name, operator, value } => {
                filter.inner = build_keyed(trimmed, &name, &operator, &value);
                if filter.inner.is_ok() {
                    filter.name = name;
                    filter.operator = operator;
                    filter.value = value;
                }
            }
        }

        if let Err(err) = &filter.inner {
            trace!(expression = %trimmed, error = %err, "Invalid filter");
        }
        filter
    }

    /// Expression as typed, trimmed.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Filter name, empty for fuzzy and invalid filters.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Operator as written.
    pub fn operator(&self) -> &str {
        &self.operator
    }

    /// Filter value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Match counter. For `@limit` filters it counts rejected alerts.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Whether the expression parsed.
    pub fn is_valid(&self) -> bool {
        self.inner.is_ok()
    }

    /// Why the expression was rejected.
    pub fn error(&self) -> Option<&FilterError> {
        self.inner.as_ref().err()
    }

    /// Whether the filter applies to individual upstream observations.
    pub fn is_alertmanager_filter(&self) -> bool {
        self.inner.as_ref().is_ok_and(|f| f.is_alertmanager_filter())
    }

    /// The limit of a valid `@limit` filter.
    pub fn limit(&self) -> Option<usize> {
        self.inner.as_ref().ok().and_then(|f| f.limit())
    }

    /// Evaluates the filter and updates the hit counter.
    ///
    /// Invalid filters never match.
    pub fn matches(&mut self, alert: &Alert, matches: usize) -> bool {
        let Ok(inner) = &self.inner else {
            return false;
        };
        let is_match = inner.matches(alert, matches);
        if inner.limit().is_some() {
            if !is_match {
                self.hits += 1;
            }
        } else if is_match {
            self.hits += 1;
        }
        is_match
    }

    /// Evaluates the filter against one observation.
    pub fn matches_alertmanager(&self, am: &AlertmanagerInstance) -> bool {
        match &self.inner {
            Ok(inner) if inner.is_alertmanager_filter() => inner.matches_alertmanager(am),
            _ => true,
        }
    }

    /// The filter as echoed back to clients.
    pub fn to_api(&self) -> ApiFilter {
        ApiFilter {
            text: self.raw_text.clone(),
            name: self.name.clone(),
            matcher: self.operator.clone(),
            value: self.value.clone(),
            hits: self.hits,
            is_valid: self.is_valid(),
        }
    }
}

fn build_keyed(
    expression: &str,
    name: &str,
    operator: &str,
    value: &str,
) -> Result<Box<dyn AlertFilter>, FilterError> {
    if value.is_empty() {
        return Err(FilterError::MissingValue {
            expression: expression.to_string(),
        });
    }
    let definition = lookup(name).ok_or_else(|| FilterError::UnknownFilter {
        name: name.to_string(),
    })?;
    let op = Operator::parse(operator).ok_or_else(|| FilterError::UnknownOperator {
        operator: operator.to_string(),
    })?;
    if !definition.operators.contains(&op) {
        return Err(FilterError::UnsupportedOperator {
            name: name.to_string(),
            operator: operator.to_string(),
        });
    }
    op.validate(value)?;
    (definition.factory)(name, op, value)
}

/// Parses every expression, dropping empty ones.
pub fn parse_filters<S: AsRef<str>>(expressions: &[S]) -> Vec<Filter> {
    expressions
        .iter()
        .map(|e| Filter::new(e.as_ref()))
        .filter(|f| !f.raw_text().is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use karma_models::{AlertState, Labels};
    use proptest::prelude::*;
    use test_case::test_case;

    fn alert() -> Alert {
        let labels: Labels = [("node".to_string(), "vps1".to_string())].into();
        let mut a = Alert::new(labels, "default", chrono::Utc::now());
        a.alertmanager.push(AlertmanagerInstance {
            name: "am1".to_string(),
            state: AlertState::Active,
            ..Default::default()
        });
        a
    }

    #[test_case("node===vps1" ; "triple equal")]
    #[test_case("node=" ; "missing value")]
    #[test_case("node=~((" ; "broken regex")]
    #[test_case("@state=xx" ; "unknown state")]
    #[test_case("@state=~active" ; "unsupported operator")]
    #[test_case("@cluster=" ; "empty cluster")]
    #[test_case("@age=1h" ; "age equality")]
    #[test_case("@limit=0" ; "zero limit")]
    #[test_case("@unknown=1" ; "unknown synthetic name")]
    #[test_case("" ; "empty")]
    fn invalid_expressions(expression: &str) {
        let mut f = Filter::new(expression);
        assert!(!f.is_valid());
        assert!(!f.matches(&alert(), 0));
        assert_eq!(f.hits(), 0);
        assert_eq!(f.to_api().text, expression);
    }

    #[test]
    fn valid_filter_counts_hits() {
        let mut f = Filter::new(" node=vps1 ");
        assert!(f.is_valid());
        assert_eq!(f.raw_text(), "node=vps1");
        assert_eq!((f.name(), f.operator(), f.value()), ("node", "=", "vps1"));
        assert!(f.matches(&alert(), 0));
        assert_eq!(f.hits(), 1);
    }

    #[test]
    fn fuzzy_filter_reports_regex_operator() {
        let f = Filter::new("vps");
        assert!(f.is_valid());
        assert_eq!(f.name(), "");
        assert_eq!(f.operator(), "=~");
        assert_eq!(f.value(), "vps");
    }

    #[test]
    fn parse_filters_drops_blank_expressions() {
        let filters = parse_filters(&["", "  ", "a=b"]);
        assert_eq!(filters.len(), 1);
    }

    proptest! {
        #[test]
        fn raw_text_is_preserved(expression in "[a-z@=!~<> ]{1,12}") {
            let mut f = Filter::new(&expression);
            prop_assert_eq!(f.raw_text(), trim_expression(&expression));
            if f.is_valid() {
                // valid filters must evaluate without panicking
                let _ = f.matches(&alert(), 0);
            }
        }
    }
}
