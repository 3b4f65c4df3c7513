//! Flat, sorted list of alert label sets.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use karma_models::{natural_cmp, AlertGroup, Labels};

const FALLBACK_LABEL: &str = "alertname";

fn compare(a: &Labels, b: &Labels, keys: &BTreeSet<&str>) -> Ordering {
    for key in keys {
        let ord = match (a.get(*key), b.get(*key)) {
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(va), Some(vb)) => natural_cmp(va, vb),
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    let fallback = |l: &Labels| l.get(FALLBACK_LABEL).cloned().unwrap_or_default();
    natural_cmp(&fallback(a), &fallback(b))
}

/// Unique merged group and alert labels of every alert in `groups`.
pub fn alert_list(groups: &[AlertGroup]) -> Vec<Labels> {
    let mut unique: BTreeSet<Labels> = BTreeSet::new();
    for group in groups {
        for alert in &group.alerts {
            let mut labels = group.labels.clone();
            labels.extend(alert.labels.iter().map(|(k, v)| (k.clone(), v.clone())));
            unique.insert(labels);
        }
    }

    let keys: BTreeSet<String> = unique.iter().flat_map(|l| l.keys().cloned()).collect();
    let keys: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
    let mut list: Vec<Labels> = unique.into_iter().collect();
    list.sort_by(|a, b| compare(a, b, &keys));
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use karma_models::Alert;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    #[test]
    fn merges_dedups_and_sorts() {
        let mut group = AlertGroup::new("default", labels(&[("alertname", "Down")]));
        for pairs in [
            &[("instance", "server10")][..],
            &[("instance", "server2")][..],
            &[("instance", "server2")][..],
            &[("job", "node")][..],
        ] {
            group.alerts.push(Alert::new(labels(pairs), "default", Utc::now()));
        }

        let list = alert_list(&[group]);
        assert_eq!(
            list,
            vec![
                labels(&[("alertname", "Down"), ("instance", "server2")]),
                labels(&[("alertname", "Down"), ("instance", "server10")]),
                labels(&[("alertname", "Down"), ("job", "node")]),
            ]
        );
    }

    #[test]
    fn empty() {
        assert!(alert_list(&[]).is_empty());
    }
}
