//! Filters on the upstreams observing an alert: `@alertmanager`, `@cluster`
//! and `@fingerprint`.
//!
//! These are alertmanager filters. An alert passes when at least one of its
//! observations passes, and observations that fail are dropped from the
//! alert afterwards.

use std::collections::BTreeMap;

use karma_models::{Alert, AlertmanagerInstance, Autocomplete};

use crate::error::Result;
use crate::filter::AlertFilter;
use crate::kinds::any_observation;
use crate::matcher::Operator;
use crate::registry::hint;

#[derive(Debug, Clone, Copy)]
enum Field {
    Name,
    Cluster,
    Fingerprint,
}

impl Field {
    fn get(self, am: &AlertmanagerInstance) -> &str {
        match self {
            Self::Name => &am.name,
            Self::Cluster => &am.cluster,
            Self::Fingerprint => &am.fingerprint,
        }
    }
}

#[derive(Debug)]
struct ObservationFilter {
    field: Field,
    op: Operator,
    value: String,
}

impl AlertFilter for ObservationFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        any_observation(alert, |am| self.matches_alertmanager(am))
    }

    fn is_alertmanager_filter(&self) -> bool {
        true
    }

    fn matches_alertmanager(&self, am: &AlertmanagerInstance) -> bool {
        self.op.compare(self.field.get(am), &self.value)
    }
}

fn build(field: Field, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    Ok(Box::new(ObservationFilter {
        field,
        op,
        value: value.to_string(),
    }))
}

pub(crate) fn new_alertmanager_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Field::Name, op, value)
}

pub(crate) fn new_cluster_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Field::Cluster, op, value)
}

pub(crate) fn new_fingerprint_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Field::Fingerprint, op, value)
}

fn equality_hints(field: Field, name: &str, alerts: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = BTreeMap::new();
    for am in alerts.iter().flat_map(|a| a.alertmanager.iter()) {
        let value = field.get(am);
        if value.is_empty() {
            continue;
        }
        for op in Operator::EQUALITY {
            let h = hint(name, *op, value, &[value]);
            hints.insert(h.value.clone(), h);
        }
    }
    hints.into_values().collect()
}

pub(crate) fn alertmanager_hints(name: &str, _: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    equality_hints(Field::Name, name, alerts)
}

pub(crate) fn cluster_hints(name: &str, _: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    equality_hints(Field::Cluster, name, alerts)
}

pub(crate) fn fingerprint_hints(name: &str, _: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    equality_hints(Field::Fingerprint, name, alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use karma_models::Labels;
    use test_case::test_case;

    fn observation(name: &str, cluster: &str, fingerprint: &str) -> AlertmanagerInstance {
        AlertmanagerInstance {
            name: name.to_string(),
            cluster: cluster.to_string(),
            fingerprint: fingerprint.to_string(),
            ..Default::default()
        }
    }

    fn alert() -> Alert {
        let mut a = Alert::new(Labels::new(), "default", chrono::Utc::now());
        a.alertmanager = vec![observation("am1", "HA", "1234"), observation("am2", "HA", "01234")];
        a
    }

    #[test_case("@alertmanager=am1", true, &[true, false] ; "name equal")]
    #[test_case("@alertmanager!=am1", true, &[false, true] ; "name not equal keeps other")]
    #[test_case("@alertmanager=~^am", true, &[true, true] ; "name regex")]
    #[test_case("@alertmanager=am3", false, &[false, false] ; "unknown name")]
    #[test_case("@cluster=HA", true, &[true, true] ; "cluster")]
    #[test_case("@cluster!~ha", false, &[false, false] ; "cluster negative regex")]
    #[test_case("@fingerprint=1234", true, &[true, false] ; "fingerprint")]
    #[test_case("@fingerprint=~123", true, &[true, true] ; "fingerprint regex")]
    #[test_case("@fingerprint!=cde", true, &[true, true] ; "fingerprint not equal")]
    fn observation_matching(expression: &str, alert_match: bool, am_matches: &[bool]) {
        let a = alert();
        let mut f = Filter::new(expression);
        assert!(f.is_valid());
        assert!(f.is_alertmanager_filter());
        assert_eq!(f.matches(&a, 0), alert_match);
        let got: Vec<bool> = a.alertmanager.iter().map(|am| f.matches_alertmanager(am)).collect();
        assert_eq!(got, am_matches);
    }

    #[test]
    fn fingerprint_rejects_negative_regex() {
        assert!(!Filter::new("@fingerprint!~1").is_valid());
    }

    #[test]
    fn hints_skip_empty_values() {
        let mut a = alert();
        a.alertmanager[0].cluster = String::new();
        a.alertmanager[1].cluster = String::new();
        assert!(cluster_hints("@cluster", Operator::STRING, &[a.clone()]).is_empty());
        let values: Vec<String> = alertmanager_hints("@alertmanager", Operator::STRING, &[a])
            .into_iter()
            .map(|h| h.value)
            .collect();
        assert_eq!(
            values,
            vec!["@alertmanager!=am1", "@alertmanager!=am2", "@alertmanager=am1", "@alertmanager=am2"]
        );
    }
}
