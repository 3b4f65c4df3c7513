//! Group and grid ordering.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use karma_models::api::AlertsRequest;
use karma_models::{natural_cmp, AlertGroup};

use crate::config::GridSorting;

/// How groups inside a grid are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// By the newest alert start.
    StartsAt,
    /// By the value of one label.
    Label,
    /// By group ID.
    Disabled,
}

impl SortOrder {
    /// Parses a configured or requested order, unknown values sort by start.
    pub fn parse(value: &str) -> Self {
        match value {
            "label" => Self::Label,
            "disabled" => Self::Disabled,
            _ => Self::StartsAt,
        }
    }
}

/// Effective group ordering for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOptions {
    /// Order kind.
    pub order: SortOrder,
    /// Reverse flag.
    pub reverse: bool,
    /// Label used by [`SortOrder::Label`].
    pub label: String,
}

impl SortOptions {
    /// Request values when the client picked an order, config otherwise.
    pub fn resolve(request: &AlertsRequest, config: &GridSorting) -> Self {
        if request.sort_order.is_empty() {
            return Self {
                order: SortOrder::parse(&config.order),
                reverse: config.reverse,
                label: config.label.clone(),
            };
        }
        Self {
            order: SortOrder::parse(&request.sort_order),
            reverse: request.sort_reverse,
            label: if request.sort_label.is_empty() {
                config.label.clone()
            } else {
                request.sort_label.clone()
            },
        }
    }
}

/// Label value to sort key, per label name.
pub type ValueMapping = BTreeMap<String, BTreeMap<String, String>>;

fn mapped<'a>(mapping: &'a ValueMapping, label: &str, value: &'a str) -> &'a str {
    mapping
        .get(label)
        .and_then(|values| values.get(value))
        .map_or(value, String::as_str)
}

fn group_label_value<'a>(group: &'a AlertGroup, label: &str) -> &'a str {
    group
        .labels
        .get(label)
        .or_else(|| group.shared.labels.get(label))
        .or_else(|| group.alerts.first().and_then(|a| a.labels.get(label)))
        .map_or("", String::as_str)
}

fn by_starts_at(a: &AlertGroup, b: &AlertGroup, reverse: bool) -> Ordering {
    if a.latest_starts_at == b.latest_starts_at {
        return b.id.cmp(&a.id);
    }
    let ord = a.latest_starts_at.cmp(&b.latest_starts_at);
    if reverse { ord.reverse() } else { ord }
}

/// Empty values go first when `reverse` is set, last otherwise.
fn by_value(a: &str, b: &str, reverse: bool) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, false) => {
            if reverse {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, true) => {
            if reverse {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        _ => {
            let ord = natural_cmp(a, b);
            if reverse { ord.reverse() } else { ord }
        }
    }
}

/// Orders groups in place.
pub fn sort_groups(groups: &mut [AlertGroup], options: &SortOptions, mapping: &ValueMapping) {
    match options.order {
        SortOrder::StartsAt => groups.sort_by(|a, b| by_starts_at(a, b, options.reverse)),
        SortOrder::Label => groups.sort_by(|a, b| {
            let va = mapped(mapping, &options.label, group_label_value(a, &options.label));
            let vb = mapped(mapping, &options.label, group_label_value(b, &options.label));
            if va == vb {
                return by_starts_at(a, b, true);
            }
            by_value(va, vb, options.reverse)
        }),
        SortOrder::Disabled => groups.sort_by(|a, b| {
            if options.reverse {
                a.id.cmp(&b.id)
            } else {
                b.id.cmp(&a.id)
            }
        }),
    }
}

/// Orders grid values of `label` in place.
pub fn sort_grid_values(values: &mut [String], label: &str, reverse: bool, mapping: &ValueMapping) {
    values.sort_by(|a, b| by_value(mapped(mapping, label, a), mapped(mapping, label, b), reverse));
}
