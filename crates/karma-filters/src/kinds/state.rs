//! `@state`, `@age` and `@inhibited` filters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use karma_models::{Alert, AlertState, AlertmanagerInstance, Autocomplete};

use crate::error::{FilterError, Result};
use crate::filter::AlertFilter;
use crate::kinds::any_observation;
use crate::matcher::Operator;
use crate::registry::hint;

#[derive(Debug)]
struct StateFilter {
    op: Operator,
    value: AlertState,
}

impl AlertFilter for StateFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        self.op.compare(alert.state().as_str(), self.value.as_str())
    }

    fn is_alertmanager_filter(&self) -> bool {
        true
    }

    fn matches_alertmanager(&self, am: &AlertmanagerInstance) -> bool {
        self.op.compare(am.state.as_str(), self.value.as_str())
    }
}

pub(crate) fn new_state_filter(name: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    let state = AlertState::parse(value).ok_or_else(|| FilterError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: "expected one of unprocessed, active, suppressed".to_string(),
    })?;
    Ok(Box::new(StateFilter { op, value: state }))
}

pub(crate) fn state_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = BTreeMap::new();
    for alert in alerts {
        let state = alert.state();
        for op in operators {
            let h = hint(name, *op, state.as_str(), &[state.as_str()]);
            hints.insert(h.value.clone(), h);
        }
    }
    hints.into_values().collect()
}

/// `@age<1h` matches alerts younger than an hour, `@age>1h` older ones.
#[derive(Debug)]
struct AgeFilter {
    op: Operator,
    age: Duration,
}

impl AgeFilter {
    fn check(&self, starts_at: DateTime<Utc>) -> bool {
        let cutoff = Utc::now() - self.age;
        match self.op {
            Operator::LessThan => starts_at > cutoff,
            _ => starts_at < cutoff,
        }
    }
}

impl AlertFilter for AgeFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        self.check(alert.starts_at)
    }

    fn is_alertmanager_filter(&self) -> bool {
        true
    }

    fn matches_alertmanager(&self, am: &AlertmanagerInstance) -> bool {
        self.check(am.starts_at)
    }
}

pub(crate) fn new_age_filter(name: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    let invalid = |reason: String| FilterError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason,
    };
    let parsed = humantime::parse_duration(value.trim_start_matches('-')).map_err(|e| invalid(e.to_string()))?;
    let age = Duration::from_std(parsed).map_err(|e| invalid(e.to_string()))?;
    Ok(Box::new(AgeFilter { op, age }))
}

pub(crate) fn age_hints(name: &str, operators: &[Operator], _: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = Vec::new();
    for op in operators {
        for value in ["10m", "1h"] {
            hints.push(hint(name, *op, value, &[]));
        }
    }
    hints
}

#[derive(Debug)]
struct InhibitedFilter {
    value: bool,
}

impl AlertFilter for InhibitedFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        any_observation(alert, |am| self.matches_alertmanager(am))
    }

    fn is_alertmanager_filter(&self) -> bool {
        true
    }

    fn matches_alertmanager(&self, am: &AlertmanagerInstance) -> bool {
        !am.inhibited_by.is_empty() == self.value
    }
}

pub(crate) fn new_inhibited_filter(name: &str, _: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    let value = match value {
        "true" => true,
        "false" => false,
        _ => {
            return Err(FilterError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
                reason: "expected true or false".to_string(),
            })
        }
    };
    Ok(Box::new(InhibitedFilter { value }))
}

pub(crate) fn inhibited_hints(name: &str, operators: &[Operator], _: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = Vec::new();
    for op in operators {
        for value in ["true", "false"] {
            hints.push(hint(name, *op, value, &[value]));
        }
    }
    hints
}
