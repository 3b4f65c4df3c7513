//! Applying a filter set to deduplicated alert groups.

use karma_models::{Alert, AlertGroup};

use crate::filter::Filter;

/// Evaluates every valid filter against `alert` and reports whether all of
/// them matched.
///
/// Filters are never short-circuited so each one keeps an accurate hit
/// count. `@limit` filters run last and see `matches`, the number of alerts
/// that passed so far.
fn alert_passes(alert: &Alert, filters: &mut [Filter], matches: usize) -> bool {
    let mut passed = true;
    for filter in filters.iter_mut().filter(|f| f.is_valid() && f.limit().is_none()) {
        if !filter.matches(alert, matches) {
            passed = false;
        }
    }
    if passed {
        for filter in filters.iter_mut().filter(|f| f.limit().is_some()) {
            if !filter.matches(alert, matches) {
                passed = false;
            }
        }
    }
    passed
}

/// Returns copies of `groups` holding only the alerts that pass `filters`.
///
/// Invalid filters are skipped while at least one valid filter is present.
/// A filter set made only of invalid filters matches nothing.
///
/// Observations rejected by an alertmanager filter are removed from the
/// surviving alerts, and an alert left without observations is dropped.
/// Groups without alerts are dropped. Hit counters on `filters` are updated
/// in place.
pub fn filter_alerts(groups: &[AlertGroup], filters: &mut [Filter]) -> Vec<AlertGroup> {
    if !filters.is_empty() && filters.iter().all(|f| !f.is_valid()) {
        return Vec::new();
    }

    let mut matches = 0;
    let mut filtered = Vec::new();

    for group in groups {
        let mut copy = AlertGroup {
            id: group.id.clone(),
            receiver: group.receiver.clone(),
            labels: group.labels.clone(),
            ..Default::default()
        };

        for alert in &group.alerts {
            if !alert_passes(alert, filters, matches) {
                continue;
            }

            let mut alert = alert.clone();
            alert
                .alertmanager
                .retain(|am| filters.iter().all(|f| f.matches_alertmanager(am)));
            if alert.alertmanager.is_empty() {
                continue;
            }

            matches += 1;
            copy.alerts.push(alert);
        }

        if !copy.alerts.is_empty() {
            copy.recount();
            copy.latest_starts_at = copy.find_latest_starts_at();
            filtered.push(copy);
        }
    }

    filtered
}
