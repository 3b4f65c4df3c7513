//! Builds API responses from the merged upstream snapshots.
//!
//! Everything here is synchronous CPU work over data already pulled by the
//! registry. Handlers call in, serialize the result and cache it.

pub mod alert_list;
pub mod auto_grid;
pub mod counters;
pub mod silences;
pub mod sort;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use karma_filters::{filter_alerts, parse_filters, Filter};
use karma_models::api::{
    AlertAcknowledgementSettings, AlertsRequest, AlertsResponse, Grid, GridSettings, Settings,
    SilenceFormSettings, SilenceFormStripSettings, SortSettings,
};
use karma_models::{Alert, AlertGroup, LabelsColorMap, Silence, StateCount};
use karma_upstream::{SilencesByCluster, UpstreamRegistry};

use crate::config::Config;

pub use alert_list::alert_list;
pub use auto_grid::auto_grid_label;
pub use counters::count_labels;
pub use silences::{select_silences, SilenceQuery};
pub use sort::{sort_grid_values, sort_groups, SortOptions, SortOrder};

/// Grid label that picks one automatically.
pub const AUTO_GRID_LABEL: &str = "@auto";

/// Server version reported in responses.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// UI settings derived from the config.
pub fn settings(config: &Config) -> Settings {
    Settings {
        sorting: SortSettings {
            grid: GridSettings {
                order: config.grid.sorting.order.clone(),
                reverse: config.grid.sorting.reverse,
                label: config.grid.sorting.label.clone(),
            },
            value_mapping: config.grid.sorting.custom_values.labels.clone(),
        },
        static_color_labels: config.labels.color.static_labels.clone(),
        value_only_labels: config.labels.value_only.clone(),
        annotations_default_hidden: config.annotations.default.hidden,
        annotations_hidden: config.annotations.hidden.clone(),
        annotations_visible: config.annotations.visible.clone(),
        annotations_allow_html: config.annotations.enable_insecure_html,
        silence_form: SilenceFormSettings {
            strip: SilenceFormStripSettings {
                labels: config.silence_form.strip.labels.clone(),
            },
            author: String::new(),
        },
        alert_acknowledgement: AlertAcknowledgementSettings {
            enabled: config.alert_acknowledgement.enabled,
            duration_seconds: config.alert_acknowledgement.duration.as_secs(),
            author: config.alert_acknowledgement.author.clone(),
            comment: config.alert_acknowledgement.comment.clone(),
        },
        history_enabled: config.history.enabled,
        grid_group_limit: config.grid.group_limit,
    }
}

/// Deduplicated groups with `filters` applied.
pub fn filtered_groups(registry: &UpstreamRegistry, filters: &mut [Filter]) -> Vec<AlertGroup> {
    filter_alerts(&registry.dedup_alerts(), filters)
}

/// Whether the upstreams form more than one cluster.
pub fn has_multiple_clusters(registry: &UpstreamRegistry) -> bool {
    registry.clusters().len() > 1
}

/// Values of `grid_label` for one alert. Observation based labels can have
/// several.
fn grid_values(alert: &Alert, grid_label: &str) -> Vec<String> {
    match grid_label {
        "" => vec![String::new()],
        "@receiver" => vec![alert.receiver.clone()],
        "@alertmanager" => unique(alert.alertmanager.iter().map(|am| am.name.clone())),
        "@cluster" => unique(alert.alertmanager.iter().map(|am| am.cluster.clone())),
        label => vec![alert.labels.get(label).cloned().unwrap_or_default()],
    }
}

fn unique(values: impl Iterator<Item = String>) -> Vec<String> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Copy of `alert` holding only the observations behind `value`.
fn split_alert(alert: &Alert, grid_label: &str, value: &str) -> Alert {
    let mut alert = alert.clone();
    match grid_label {
        "@alertmanager" => alert.alertmanager.retain(|am| am.name == value),
        "@cluster" => alert.alertmanager.retain(|am| am.cluster == value),
        _ => {}
    }
    alert
}

fn copy_color(target: &mut LabelsColorMap, source: &LabelsColorMap, name: &str, value: &str) {
    if let Some(color) = source.get(name).and_then(|values| values.get(value)) {
        target
            .entry(name.to_string())
            .or_default()
            .insert(value.to_string(), color.clone());
    }
}

struct Collector<'a> {
    all_colors: &'a LabelsColorMap,
    all_silences: &'a SilencesByCluster,
    colors: LabelsColorMap,
    silences: SilencesByCluster,
}

impl Collector<'_> {
    fn collect(&mut self, alert: &Alert) {
        copy_color(&mut self.colors, self.all_colors, "@receiver", &alert.receiver);
        for am in &alert.alertmanager {
            copy_color(&mut self.colors, self.all_colors, "@alertmanager", &am.name);
            copy_color(&mut self.colors, self.all_colors, "@cluster", &am.cluster);

            let all_silences: &SilencesByCluster = self.all_silences;
            let known = all_silences.get(&am.cluster);
            let target = self.silences.entry(am.cluster.clone()).or_default();
            for id in &am.silenced_by {
                let silence: Option<Silence> = known
                    .and_then(|k| k.get(id).cloned())
                    .or_else(|| am.silences.iter().find(|s| s.id == *id).cloned());
                if let Some(silence) = silence {
                    target.insert(id.clone(), silence);
                }
            }
        }
        for (name, value) in &alert.labels {
            copy_color(&mut self.colors, self.all_colors, name, value);
        }
    }
}

fn group_limit(request: &AlertsRequest, config: &Config, group: &AlertGroup) -> usize {
    let limit = request
        .group_limits
        .get(&group.id)
        .copied()
        .or((request.default_group_limit > 0).then_some(request.default_group_limit))
        .unwrap_or(config.ui.alerts_per_group);
    limit.min(group.alerts.len())
}

fn grid_limit(request: &AlertsRequest, config: &Config, value: &str, total: usize) -> usize {
    let limit = request.grid_limits.get(value).copied().unwrap_or(config.grid.group_limit);
    limit.min(total).max(1)
}

/// Builds the body of `POST /alerts.json`.
///
/// `timestamp` and `authentication` are left for the caller, they change
/// per request while everything else is cacheable.
pub fn alerts_response(registry: &UpstreamRegistry, config: &Config, request: &AlertsRequest) -> AlertsResponse {
    let mut filters = parse_filters(&request.filters);
    let groups = filtered_groups(registry, &mut filters);

    let grid_label = if request.grid_label == AUTO_GRID_LABEL {
        auto_grid_label(&groups, &config.grid.auto)
    } else {
        request.grid_label.clone()
    };

    let all_colors = registry.dedup_colors();
    let all_silences = registry.dedup_silences();
    let mut collector = Collector {
        all_colors: &all_colors,
        all_silences: &all_silences,
        colors: LabelsColorMap::new(),
        silences: registry.clusters().into_keys().map(|c| (c, BTreeMap::new())).collect(),
    };

    let mut grids: BTreeMap<String, BTreeMap<String, AlertGroup>> = BTreeMap::new();
    let mut receivers = BTreeSet::new();
    let mut label_names = BTreeSet::new();

    for group in &groups {
        receivers.insert(group.receiver.clone());
        for alert in &group.alerts {
            label_names.extend(alert.labels.keys().cloned());
            for value in grid_values(alert, &grid_label) {
                let alert = split_alert(alert, &grid_label, &value);
                if alert.alertmanager.is_empty() {
                    continue;
                }
                collector.collect(&alert);
                grids
                    .entry(value)
                    .or_default()
                    .entry(group.id.clone())
                    .or_insert_with(|| AlertGroup {
                        id: group.id.clone(),
                        receiver: group.receiver.clone(),
                        labels: group.labels.clone(),
                        ..Default::default()
                    })
                    .alerts
                    .push(alert);
            }
        }
    }

    let transforms = registry.transforms();
    for filter in &filters {
        if filter.is_valid() && filter.operator() == "=" && !filter.value().is_empty() {
            transforms.colors.color_label(&mut collector.colors, filter.name(), filter.value());
        }
    }

    let options = SortOptions::resolve(request, &config.grid.sorting);
    let mapping = &config.grid.sorting.custom_values.labels;
    let ignored = vec![grid_label.clone()];
    let mut total_alerts = 0;

    let mut values: Vec<String> = grids.keys().cloned().collect();
    sort_grid_values(&mut values, &grid_label, request.grid_sort_reverse, mapping);

    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let Some(by_id) = grids.remove(&value) else {
            continue;
        };
        let mut state_count = StateCount::default();
        let mut alert_groups: Vec<AlertGroup> = by_id
            .into_values()
            .map(|mut group| {
                group.finalize();
                group.dedup_shared_maps(&ignored);
                total_alerts += group.alerts.len();
                state_count.merge(&group.state_count);
                let limit = group_limit(request, config, &group);
                group.alerts.truncate(limit);
                group
            })
            .collect();
        sort_groups(&mut alert_groups, &options, mapping);

        let total_groups = alert_groups.len();
        alert_groups.truncate(grid_limit(request, config, &value, total_groups));
        out.push(Grid {
            label_name: grid_label.clone(),
            label_value: value,
            alert_groups,
            total_groups,
            state_count,
        });
    }

    AlertsResponse {
        status: "success".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        version: VERSION.to_string(),
        upstreams: registry.summary(&config.listen.prefix),
        silences: collector.silences,
        grids: out,
        total_alerts,
        colors: collector.colors,
        filters: filters
            .iter()
            .filter(|f| !f.raw_text().is_empty())
            .map(Filter::to_api)
            .collect(),
        counters: count_labels(&groups, has_multiple_clusters(registry)),
        settings: settings(config),
        authentication: Default::default(),
        label_names: label_names.into_iter().collect(),
        receivers: receivers.into_iter().collect(),
    }
}
