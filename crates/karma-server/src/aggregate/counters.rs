//! Label hit counters over filtered alerts.

use std::collections::{BTreeSet, HashMap};

use karma_models::api::{counters_to_label_stats, LabelNameStats};
use karma_models::AlertGroup;

/// Counts label values across every alert of `groups`.
///
/// `@state` and `@receiver` are always counted, `@cluster` only when
/// `with_cluster` is set.
pub fn count_labels(groups: &[AlertGroup], with_cluster: bool) -> Vec<LabelNameStats> {
    let mut counters: HashMap<String, HashMap<String, usize>> = HashMap::new();
    let mut add = |name: &str, value: &str| {
        *counters
            .entry(name.to_string())
            .or_default()
            .entry(value.to_string())
            .or_default() += 1;
    };

    for group in groups {
        for alert in &group.alerts {
            if with_cluster {
                let clusters: BTreeSet<&str> = alert.alertmanager.iter().map(|am| am.cluster.as_str()).collect();
                for cluster in clusters {
                    add("@cluster", cluster);
                }
            }
            add("@state", alert.state().as_str());
            add("@receiver", &alert.receiver);
            for (name, value) in &alert.labels {
                add(name, value);
            }
        }
    }

    counters_to_label_stats(&counters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use karma_models::{Alert, AlertState, AlertmanagerInstance, Labels};

    fn group(alerts: &[(&str, &str, AlertState)]) -> AlertGroup {
        let mut group = AlertGroup::new("default", Labels::new());
        for (instance, cluster, state) in alerts {
            let labels: Labels = [("instance".to_string(), (*instance).to_string())].into();
            let mut alert = Alert::new(labels, "default", Utc::now());
            alert.alertmanager.push(AlertmanagerInstance {
                name: (*cluster).to_string(),
                cluster: (*cluster).to_string(),
                state: *state,
                ..Default::default()
            });
            alert.alertmanager.push(AlertmanagerInstance {
                name: format!("{cluster}-replica"),
                cluster: (*cluster).to_string(),
                state: *state,
                ..Default::default()
            });
            group.alerts.push(alert);
        }
        group
    }

    fn find<'a>(stats: &'a [LabelNameStats], name: &str) -> Option<&'a LabelNameStats> {
        stats.iter().find(|s| s.name == name)
    }

    #[test]
    fn counts_labels_and_synthetic_names() {
        let groups = vec![group(&[
            ("a", "prod", AlertState::Active),
            ("b", "prod", AlertState::Suppressed),
            ("b", "dev", AlertState::Active),
        ])];

        let stats = count_labels(&groups, true);
        let state = find(&stats, "@state").unwrap();
        assert_eq!(state.hits, 3);
        assert_eq!(state.values[0].value, "active");
        assert_eq!(state.values[0].hits, 2);
        assert_eq!(state.values[0].percent + state.values[1].percent, 100);

        // One hit per alert even with two observations in the cluster.
        let cluster = find(&stats, "@cluster").unwrap();
        assert_eq!(cluster.hits, 3);

        let instance = find(&stats, "instance").unwrap();
        assert_eq!(instance.values[0].raw, "instance=b");
        assert_eq!(find(&stats, "@receiver").unwrap().hits, 3);
    }

    #[test]
    fn cluster_is_optional() {
        let groups = vec![group(&[("a", "prod", AlertState::Active)])];
        assert!(find(&count_labels(&groups, false), "@cluster").is_none());
        assert!(count_labels(&[], true).is_empty());
    }
}
