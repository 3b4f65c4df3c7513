//! Filters on silences and inhibitions attached to observations.

use std::collections::BTreeMap;

use karma_models::{Alert, AlertmanagerInstance, Autocomplete, Silence};

use crate::error::Result;
use crate::filter::AlertFilter;
use crate::kinds::any_observation;
use crate::matcher::Operator;
use crate::registry::hint;

#[derive(Debug, Clone, Copy)]
enum Source {
    SilenceId,
    Ticket,
    Author,
    SilencedBy,
    InhibitedBy,
}

impl Source {
    fn values(self, am: &AlertmanagerInstance) -> Vec<&str> {
        fn silence_field<'a>(am: &'a AlertmanagerInstance, get: fn(&Silence) -> &str) -> Vec<&'a str> {
            am.silences.iter().map(get).filter(|v| !v.is_empty()).collect()
        }
        match self {
            Self::SilenceId | Self::SilencedBy => am.silenced_by.iter().map(String::as_str).collect(),
            Self::InhibitedBy => am.inhibited_by.iter().map(String::as_str).collect(),
            Self::Ticket => silence_field(am, |s| s.ticket_id.as_str()),
            Self::Author => silence_field(am, |s| s.created_by.as_str()),
        }
    }
}

#[derive(Debug)]
struct SilenceFilter {
    source: Source,
    op: Operator,
    value: String,
}

impl AlertFilter for SilenceFilter {
    fn matches(&self, alert: &Alert, _matches: usize) -> bool {
        any_observation(alert, |am| self.matches_alertmanager(am))
    }

    fn is_alertmanager_filter(&self) -> bool {
        true
    }

    fn matches_alertmanager(&self, am: &AlertmanagerInstance) -> bool {
        self.op.compare_any(self.source.values(am), &self.value)
    }
}

fn build(source: Source, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    Ok(Box::new(SilenceFilter {
        source,
        op,
        value: value.to_string(),
    }))
}

pub(crate) fn new_silence_id_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Source::SilenceId, op, value)
}

pub(crate) fn new_silence_ticket_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Source::Ticket, op, value)
}

pub(crate) fn new_silence_author_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Source::Author, op, value)
}

pub(crate) fn new_silenced_by_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Source::SilencedBy, op, value)
}

pub(crate) fn new_inhibited_by_filter(_: &str, op: Operator, value: &str) -> Result<Box<dyn AlertFilter>> {
    build(Source::InhibitedBy, op, value)
}

fn hints_for(source: Source, name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    let mut hints = BTreeMap::new();
    for am in alerts.iter().flat_map(|a| a.alertmanager.iter()) {
        for value in source.values(am) {
            for op in operators {
                let h = hint(name, *op, value, &[value]);
                hints.insert(h.value.clone(), h);
            }
        }
    }
    hints.into_values().collect()
}

pub(crate) fn silence_id_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    hints_for(Source::SilenceId, name, operators, alerts)
}

pub(crate) fn silence_ticket_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    hints_for(Source::Ticket, name, operators, alerts)
}

pub(crate) fn silence_author_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    hints_for(Source::Author, name, operators, alerts)
}

pub(crate) fn silenced_by_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    hints_for(Source::SilencedBy, name, operators, alerts)
}

pub(crate) fn inhibited_by_hints(name: &str, operators: &[Operator], alerts: &[Alert]) -> Vec<Autocomplete> {
    hints_for(Source::InhibitedBy, name, operators, alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use karma_models::{AlertState, Labels};
    use test_case::test_case;

    fn alert() -> Alert {
        let mut a = Alert::new(Labels::new(), "default", chrono::Utc::now());
        a.alertmanager = vec![
            AlertmanagerInstance {
                name: "am1".to_string(),
                state: AlertState::Suppressed,
                silenced_by: vec!["abcdef".to_string()],
                silences: vec![Silence {
                    id: "abcdef".to_string(),
                    created_by: "john@example.com".to_string(),
                    comment: "PROJECT-1 maintenance".to_string(),
                    ticket_id: "PROJECT-1".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            AlertmanagerInstance {
                name: "am2".to_string(),
                state: AlertState::Suppressed,
                inhibited_by: vec!["1234".to_string()],
                ..Default::default()
            },
        ];
        a
    }

    #[test_case("@silence_id=abcdef", true, &[true, false] ; "silence id")]
    #[test_case("@silence_id!=abcdef", true, &[false, true] ; "silence id not equal")]
    #[test_case("@silence_ticket=PROJECT-1", true, &[true, false] ; "ticket")]
    #[test_case("@silence_ticket=~project", true, &[true, false] ; "ticket regex")]
    #[test_case("@silence_ticket!~project", true, &[false, true] ; "ticket negative regex")]
    #[test_case("@silence_author=john@example.com", true, &[true, false] ; "author")]
    #[test_case("@silence_author=~JOHN", true, &[true, false] ; "author regex")]
    #[test_case("@silenced_by=abcdef", true, &[true, false] ; "silenced by")]
    #[test_case("@silenced_by=fff", false, &[false, false] ; "silenced by unknown")]
    #[test_case("@inhibited_by=1234", true, &[false, true] ; "inhibited by")]
    #[test_case("@inhibited_by!=1234", true, &[true, false] ; "inhibited by not equal")]
    fn observation_matching(expression: &str, alert_match: bool, am_matches: &[bool]) {
        let a = alert();
        let mut f = Filter::new(expression);
        assert!(f.is_valid());
        assert!(f.is_alertmanager_filter());
        assert_eq!(f.matches(&a, 0), alert_match);
        let got: Vec<bool> = a.alertmanager.iter().map(|am| f.matches_alertmanager(am)).collect();
        assert_eq!(got, am_matches);
    }

    #[test_case("@silence_id=~abc" ; "silence id regex")]
    #[test_case("@silenced_by>1" ; "silenced by comparison")]
    #[test_case("@inhibited_by=~1" ; "inhibited by regex")]
    fn invalid(expression: &str) {
        assert!(!Filter::new(expression).is_valid());
    }

    #[test]
    fn ticket_hints() {
        let values: Vec<String> = silence_ticket_hints("@silence_ticket", Operator::STRING, &[alert()])
            .into_iter()
            .map(|h| h.value)
            .collect();
        assert_eq!(
            values,
            vec![
                "@silence_ticket!=PROJECT-1",
                "@silence_ticket!~PROJECT-1",
                "@silence_ticket=PROJECT-1",
                "@silence_ticket=~PROJECT-1",
            ]
        );
    }
}
