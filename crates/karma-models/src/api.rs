//! Request and response bodies of the HTTP API.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::color::LabelsColorMap;
use crate::group::{AlertGroup, StateCount};
use crate::natsort::natural_cmp;
use crate::silence::Silence;
use crate::Labels;

/// Accepts `true`/`false`, `0`/`1` and `"0"`/`"1"`.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    struct LenientBool;

    impl Visitor<'_> for LenientBool {
        type Value = bool;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a boolean, 0/1 or \"0\"/\"1\"")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<bool, E> {
            Ok(false)
        }
    }

    deserializer.deserialize_any(LenientBool)
}

/// Body of `POST /alerts.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertsRequest {
    /// Filter expressions.
    pub filters: Vec<String>,
    /// Label to split grids by. Empty means a single grid.
    pub grid_label: String,
    /// Reverse grid order.
    #[serde(deserialize_with = "lenient_bool")]
    pub grid_sort_reverse: bool,
    /// Group sort order, one of `startsAt`, `label`, `disabled`.
    pub sort_order: String,
    /// Label used when `sort_order` is `label`.
    pub sort_label: String,
    /// Reverse group order.
    #[serde(deserialize_with = "lenient_bool")]
    pub sort_reverse: bool,
    /// Alerts per group unless overridden in `group_limits`.
    pub default_group_limit: usize,
    /// Alerts per group, by group ID.
    pub group_limits: BTreeMap<String, usize>,
    /// Groups per grid, by grid label value.
    pub grid_limits: BTreeMap<String, usize>,
}

/// A filter as echoed back to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFilter {
    /// Expression as typed.
    pub text: String,
    /// Parsed label name.
    pub name: String,
    /// Parsed operator.
    pub matcher: String,
    /// Parsed value.
    pub value: String,
    /// Number of alerts the filter rejected or counted.
    pub hits: usize,
    /// Whether the expression parsed.
    pub is_valid: bool,
}

/// Groups sharing one value of the grid label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grid {
    /// Grid label name.
    pub label_name: String,
    /// Grid label value.
    pub label_value: String,
    /// Groups after truncation.
    pub alert_groups: Vec<AlertGroup>,
    /// Groups before truncation.
    pub total_groups: usize,
    /// Sum of group state counters.
    pub state_count: StateCount,
}

/// Upstream health counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamCounters {
    /// Configured upstreams.
    pub total: usize,
    /// Upstreams whose last pull succeeded.
    pub healthy: usize,
    /// Upstreams whose last pull failed.
    pub failed: usize,
}

/// Status of a single upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStatus {
    /// Upstream name.
    pub name: String,
    /// Cluster name.
    pub cluster: String,
    /// Names of upstreams in the same cluster.
    pub cluster_members: Vec<String>,
    /// Upstream URI with the password masked.
    pub uri: String,
    /// URI the browser should talk to.
    #[serde(rename = "publicURI")]
    pub public_uri: String,
    /// Whether silences can be managed.
    pub readonly: bool,
    /// Headers the browser must send.
    pub headers: BTreeMap<String, String>,
    /// Fetch credentials mode.
    pub cors_credentials: String,
    /// Last pull error, empty when healthy.
    pub error: String,
    /// Reported Alertmanager version.
    pub version: String,
}

/// Upstream section of the alerts response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamsSummary {
    /// Health counters.
    pub counters: UpstreamCounters,
    /// Per-upstream status.
    pub instances: Vec<UpstreamStatus>,
    /// Cluster name to member names.
    pub clusters: BTreeMap<String, Vec<String>>,
}

/// Default grid sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSettings {
    /// Sort order.
    pub order: String,
    /// Reverse flag.
    pub reverse: bool,
    /// Sort label.
    pub label: String,
}

/// Sort settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortSettings {
    /// Default grid sort.
    pub grid: GridSettings,
    /// Label name to value to replacement used for sorting.
    pub value_mapping: BTreeMap<String, BTreeMap<String, String>>,
}

/// Labels stripped from the silence form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceFormStripSettings {
    /// Label names.
    pub labels: Vec<String>,
}

/// Silence form settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SilenceFormSettings {
    /// Stripped labels.
    pub strip: SilenceFormStripSettings,
    /// Pre-filled author, the authenticated user when auth is on.
    pub author: String,
}

/// Alert acknowledgement settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertAcknowledgementSettings {
    /// Enable acknowledgement silences.
    pub enabled: bool,
    /// Silence duration.
    pub duration_seconds: u64,
    /// Silence author.
    pub author: String,
    /// Silence comment.
    pub comment: String,
}

/// UI settings sent with every alerts response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Sort settings.
    pub sorting: SortSettings,
    /// Labels with a fixed color.
    pub static_color_labels: Vec<String>,
    /// Labels rendered without their name.
    pub value_only_labels: Vec<String>,
    /// Hide annotations by default.
    pub annotations_default_hidden: bool,
    /// Hidden annotation names.
    pub annotations_hidden: Vec<String>,
    /// Visible annotation names.
    pub annotations_visible: Vec<String>,
    /// Render annotation HTML.
    #[serde(rename = "annotationsAllowHTML")]
    pub annotations_allow_html: bool,
    /// Silence form settings.
    pub silence_form: SilenceFormSettings,
    /// Acknowledgement settings.
    pub alert_acknowledgement: AlertAcknowledgementSettings,
    /// Whether `/history.json` is served.
    pub history_enabled: bool,
    /// Default groups per grid.
    pub grid_group_limit: usize,
}

/// Who is asking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationInfo {
    /// Whether authentication is configured.
    pub enabled: bool,
    /// Authenticated user name.
    pub username: String,
}

/// Hits for one label value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelValueStats {
    /// Label value.
    pub value: String,
    /// Filter expression selecting the value.
    pub raw: String,
    /// Matching alerts.
    pub hits: usize,
    /// Share of the label's hits.
    pub percent: usize,
    /// Sum of the percentages before this value.
    pub offset: usize,
}

/// Hits for one label name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelNameStats {
    /// Label name.
    pub name: String,
    /// Total hits across values.
    pub hits: usize,
    /// Per-value hits.
    pub values: Vec<LabelValueStats>,
}

/// Body of `/counters.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Number of filtered alerts.
    pub total: usize,
    /// Label statistics.
    pub counters: Vec<LabelNameStats>,
}

/// Turns raw `name → value → hits` counts into sorted label statistics.
///
/// Percentages are floored and then topped up one by one, in value order,
/// until they sum to 100.
pub fn counters_to_label_stats(counters: &HashMap<String, HashMap<String, usize>>) -> Vec<LabelNameStats> {
    let mut data: Vec<LabelNameStats> = counters
        .iter()
        .map(|(name, values)| {
            let hits: usize = values.values().sum();
            let mut values: Vec<LabelValueStats> = values
                .iter()
                .map(|(value, count)| LabelValueStats {
                    value: value.clone(),
                    raw: format!("{name}={value}"),
                    hits: *count,
                    percent: if hits == 0 { 0 } else { count * 100 / hits },
                    offset: 0,
                })
                .collect();
            values.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| natural_cmp(&a.value, &b.value)));

            let mut total: usize = values.iter().map(|v| v.percent).sum();
            while total < 100 && !values.is_empty() {
                for v in &mut values {
                    v.percent += 1;
                    total += 1;
                    if total >= 100 {
                        break;
                    }
                }
            }

            let mut offset = 0;
            for v in &mut values {
                v.offset = offset;
                offset += v.percent;
            }

            LabelNameStats {
                name: name.clone(),
                hits,
                values,
            }
        })
        .collect();
    data.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.name.cmp(&b.name)));
    data
}

/// Body of `POST /alerts.json` responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsResponse {
    /// Always `success`.
    pub status: String,
    /// RFC3339 generation time.
    pub timestamp: String,
    /// Server version.
    pub version: String,
    /// Upstream status.
    pub upstreams: UpstreamsSummary,
    /// Cluster to silence ID to silence.
    pub silences: BTreeMap<String, BTreeMap<String, Silence>>,
    /// Grids in display order.
    pub grids: Vec<Grid>,
    /// Alerts across all grids before truncation.
    pub total_alerts: usize,
    /// Colors referenced by the response.
    pub colors: LabelsColorMap,
    /// Parsed filters.
    pub filters: Vec<ApiFilter>,
    /// Label statistics of the filtered alerts.
    pub counters: Vec<LabelNameStats>,
    /// UI settings.
    pub settings: Settings,
    /// Authentication block.
    pub authentication: AuthenticationInfo,
    /// Every label name seen on filtered alerts.
    pub label_names: Vec<String>,
    /// Every receiver seen on filtered alerts.
    pub receivers: Vec<String>,
}

/// Body of `POST /history.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRequest {
    /// Source URIs, usually alert generator URLs.
    pub sources: Vec<String>,
    /// Alert labels.
    pub labels: Labels,
}

/// One hourly sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetSample {
    /// Bucket time.
    pub timestamp: DateTime<Utc>,
    /// Number of state changes.
    pub value: i64,
}

/// Body of `/history.json` responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Joined per-source errors.
    pub error: String,
    /// 24 hourly samples, newest first.
    pub samples: Vec<OffsetSample>,
}

/// Body of `/alertList.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertList {
    /// Merged label sets.
    pub alerts: Vec<Labels>,
}

/// Body of `/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Server version.
    pub version: String,
}
