//! Picks a grid label for `@auto`.

use std::collections::{BTreeMap, BTreeSet};

use karma_models::AlertGroup;

use crate::config::GridAuto;

/// Returns the label that splits `groups` into the most grids, or an empty
/// string when no label is useful.
///
/// Candidates are labels set on every alert, minus ignored ones. A label
/// with a single value, or with a different value on every alert, is
/// skipped. Ties go to the label listed first in `auto.order`, then to the
/// lowest name.
pub fn auto_grid_label(groups: &[AlertGroup], auto: &GridAuto) -> String {
    let mut values: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut present: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total = 0;

    for alert in groups.iter().flat_map(|g| g.alerts.iter()) {
        total += 1;
        for (name, value) in &alert.labels {
            *present.entry(name).or_default() += 1;
            values.entry(name).or_default().insert(value);
        }
    }

    let position = |name: &str| auto.order.iter().position(|o| o == name).unwrap_or(usize::MAX);

    values
        .into_iter()
        .filter(|(name, _)| present.get(name) == Some(&total))
        .filter(|(name, _)| !auto.ignore.iter().any(|i| i == name))
        .map(|(name, set)| (name, set.len()))
        .filter(|(_, cardinality)| *cardinality > 1 && *cardinality < total)
        .min_by(|(na, ca), (nb, cb)| {
            cb.cmp(ca)
                .then_with(|| position(*na).cmp(&position(*nb)))
                .then_with(|| na.cmp(nb))
        })
        .map(|(name, _)| name.to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use karma_models::{Alert, Labels};

    fn groups(alerts: &[&[(&str, &str)]]) -> Vec<AlertGroup> {
        let mut group = AlertGroup::new("default", Labels::new());
        for pairs in alerts {
            let labels: Labels = pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
            group.alerts.push(Alert::new(labels, "default", Utc::now()));
        }
        vec![group]
    }

    #[test]
    fn picks_highest_cardinality() {
        let groups = groups(&[
            &[("alertname", "a"), ("cluster", "prod"), ("job", "x"), ("instance", "1")],
            &[("alertname", "a"), ("cluster", "dev"), ("job", "y"), ("instance", "2")],
            &[("alertname", "a"), ("cluster", "prod"), ("job", "z"), ("instance", "3")],
            &[("alertname", "a"), ("cluster", "dev"), ("job", "z"), ("instance", "4")],
        ]);
        // alertname has one value, instance one per alert.
        assert_eq!(auto_grid_label(&groups, &GridAuto::default()), "job");
    }

    #[test]
    fn ignores_labels_missing_on_some_alerts() {
        let groups = groups(&[
            &[("cluster", "prod"), ("job", "x")],
            &[("cluster", "dev"), ("job", "x")],
            &[("cluster", "dev")],
        ]);
        assert_eq!(auto_grid_label(&groups, &GridAuto::default()), "cluster");
    }

    #[test]
    fn ties_use_configured_order_then_name() {
        let alerts: &[&[(&str, &str)]] = &[
            &[("cluster", "prod"), ("region", "eu")],
            &[("cluster", "dev"), ("region", "us")],
            &[("cluster", "dev"), ("region", "us")],
        ];
        assert_eq!(auto_grid_label(&groups(alerts), &GridAuto::default()), "cluster");

        let auto = GridAuto {
            ignore: Vec::new(),
            order: vec!["region".to_string()],
        };
        assert_eq!(auto_grid_label(&groups(alerts), &auto), "region");

        let auto = GridAuto {
            ignore: vec!["cluster".to_string()],
            order: Vec::new(),
        };
        assert_eq!(auto_grid_label(&groups(alerts), &auto), "region");
    }

    #[test]
    fn nothing_useful() {
        assert_eq!(auto_grid_label(&[], &GridAuto::default()), "");
        let single = groups(&[&[("cluster", "prod")]]);
        assert_eq!(auto_grid_label(&single, &GridAuto::default()), "");
    }
}
