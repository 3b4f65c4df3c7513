//! Process-wide set of upstreams and the passes that merge their snapshots.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use karma_models::api::{UpstreamCounters, UpstreamStatus, UpstreamsSummary};
use karma_models::autocomplete::merge_hints;
use karma_models::color::merge_colors;
use karma_models::{Alert, AlertGroup, Autocomplete, LabelsColorMap, ManagedSilence, Silence};
use tracing::{info, warn};

use crate::error::{Result, UpstreamError};
use crate::transform::Transforms;
use crate::upstream::{Upstream, UpstreamConfig};

/// Silences keyed by cluster, then by ID.
pub type SilencesByCluster = BTreeMap<String, BTreeMap<String, Silence>>;

/// All configured upstreams, ordered by name.
///
/// The set is fixed at startup. Each upstream guards its own snapshot, so
/// reading through the registry only contends on per-upstream read locks.
#[derive(Debug)]
pub struct UpstreamRegistry {
    upstreams: Vec<Upstream>,
    transforms: Transforms,
}

impl UpstreamRegistry {
    /// Builds one upstream per config.
    pub fn new(configs: Vec<UpstreamConfig>, transforms: Transforms) -> Result<Self> {
        let upstreams = configs.into_iter().map(Upstream::new).collect::<Result<Vec<_>>>()?;
        Self::from_upstreams(upstreams, transforms)
    }

    /// Wraps already built upstreams, rejecting duplicate names.
    pub fn from_upstreams(mut upstreams: Vec<Upstream>, transforms: Transforms) -> Result<Self> {
        upstreams.sort_by(|a, b| a.name().cmp(b.name()));
        if let Some(pair) = upstreams.windows(2).find(|w| w[0].name() == w[1].name()) {
            return Err(UpstreamError::DuplicateName {
                name: pair[0].name().to_string(),
            });
        }
        Ok(Self { upstreams, transforms })
    }

    /// Every upstream, ordered by name.
    pub fn upstreams(&self) -> &[Upstream] {
        &self.upstreams
    }

    /// Looks up an upstream by name.
    pub fn get(&self, name: &str) -> Option<&Upstream> {
        self.upstreams
            .binary_search_by(|u| u.name().cmp(name))
            .ok()
            .map(|idx| &self.upstreams[idx])
    }

    /// Transforms applied on pull.
    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    /// Pulls every upstream concurrently and waits for all of them.
    ///
    /// Returns the number of upstreams that failed.
    pub async fn pull_all(&self) -> usize {
        let pulls = self.upstreams.iter().map(|upstream| {
            upstream.pull(&self.transforms, |status| {
                self.cluster_name_for(upstream.name(), &upstream.config().cluster, &status.peers)
            })
        });
        let failed = join_all(pulls).await.into_iter().filter(Result::is_err).count();
        if failed > 0 {
            warn!(failed, total = self.upstreams.len(), "Some Alertmanager upstreams failed");
        } else {
            info!(total = self.upstreams.len(), "Pulled all Alertmanager upstreams");
        }
        failed
    }

    /// Names of upstreams clustered with `name`, itself included, sorted.
    ///
    /// Upstreams are clustered when they report a common peer or share a
    /// configured cluster name.
    pub fn cluster_members_for(&self, name: &str, cluster: &str, peers: &[String]) -> Vec<String> {
        let mut members = BTreeSet::from([name.to_string()]);
        for other in &self.upstreams {
            if other.name() == name {
                continue;
            }
            let same_cluster = !cluster.is_empty() && other.config().cluster == cluster;
            if same_cluster || other.peers().iter().any(|p| peers.contains(p)) {
                members.insert(other.name().to_string());
            }
        }
        members.into_iter().collect()
    }

    /// Cluster name: the configured one, else the members joined with ` | `.
    pub fn cluster_name_for(&self, name: &str, cluster: &str, peers: &[String]) -> String {
        if !cluster.is_empty() {
            return cluster.to_string();
        }
        if peers.is_empty() {
            return name.to_string();
        }
        self.cluster_members_for(name, cluster, peers).join(" | ")
    }

    /// Current cluster members of `upstream`.
    pub fn cluster_members(&self, upstream: &Upstream) -> Vec<String> {
        self.cluster_members_for(upstream.name(), &upstream.config().cluster, &upstream.peers())
    }

    /// Current cluster name of `upstream`.
    pub fn cluster_name(&self, upstream: &Upstream) -> String {
        self.cluster_name_for(upstream.name(), &upstream.config().cluster, &upstream.peers())
    }

    /// Cluster name to members.
    pub fn clusters(&self) -> BTreeMap<String, Vec<String>> {
        self.upstreams
            .iter()
            .map(|u| (self.cluster_name(u), self.cluster_members(u)))
            .collect()
    }

    fn cluster_names(&self) -> HashMap<String, String> {
        self.upstreams
            .iter()
            .map(|u| (u.name().to_string(), self.cluster_name(u)))
            .collect()
    }

    /// Merges alert groups from every upstream.
    ///
    /// Alerts with the same label fingerprint inside a group become one
    /// alert carrying every observation, sorted by upstream name, with the
    /// earliest start and the latest end. Empty groups are dropped and the
    /// result is ordered by group ID.
    pub fn dedup_alerts(&self) -> Vec<AlertGroup> {
        let clusters = self.cluster_names();
        let mut groups: BTreeMap<String, AlertGroup> = BTreeMap::new();
        let mut alerts: HashMap<String, BTreeMap<String, Alert>> = HashMap::new();

        for upstream in &self.upstreams {
            for mut group in upstream.alerts() {
                let members = alerts.entry(group.id.clone()).or_default();
                for mut alert in std::mem::take(&mut group.alerts) {
                    for am in &mut alert.alertmanager {
                        if let Some(cluster) = clusters.get(&am.name) {
                            am.cluster.clone_from(cluster);
                        }
                    }
                    match members.get_mut(&alert.id) {
                        Some(existing) => merge_alert(existing, alert),
                        None => {
                            members.insert(alert.id.clone(), alert);
                        }
                    }
                }
                groups.entry(group.id.clone()).or_insert(group);
            }
        }

        groups
            .into_values()
            .filter_map(|mut group| {
                let members = alerts.remove(&group.id)?;
                group.alerts = members.into_values().collect();
                if group.alerts.is_empty() {
                    return None;
                }
                for alert in &mut group.alerts {
                    alert.alertmanager.sort_by(|a, b| a.name.cmp(&b.name));
                    alert.alertmanager.dedup_by(|a, b| a.name == b.name);
                }
                group.finalize();
                Some(group)
            })
            .collect()
    }

    /// Union of label colors, first upstream wins per label value.
    pub fn dedup_colors(&self) -> LabelsColorMap {
        let mut colors = LabelsColorMap::new();
        for upstream in &self.upstreams {
            merge_colors(&mut colors, &upstream.colors());
        }
        colors
    }

    /// Union of autocomplete hints by value.
    pub fn dedup_autocomplete(&self) -> Vec<Autocomplete> {
        merge_hints(self.upstreams.iter().map(Upstream::autocomplete))
    }

    /// Sorted union of known label names.
    pub fn dedup_known_labels(&self) -> Vec<String> {
        let labels: BTreeSet<String> = self.upstreams.iter().flat_map(Upstream::known_labels).collect();
        labels.into_iter().collect()
    }

    /// Sorted union of values seen for label `name`.
    pub fn dedup_known_label_values(&self, name: &str) -> Vec<String> {
        let mut values = BTreeSet::new();
        for upstream in &self.upstreams {
            for group in upstream.alerts() {
                for alert in &group.alerts {
                    if let Some(value) = alert.labels.get(name) {
                        values.insert(value.clone());
                    }
                }
            }
        }
        values.into_iter().collect()
    }

    /// Silences by cluster, first upstream wins per ID.
    pub fn dedup_silences(&self) -> SilencesByCluster {
        let clusters = self.cluster_names();
        let mut silences = SilencesByCluster::new();
        for upstream in &self.upstreams {
            let Some(cluster) = clusters.get(upstream.name()) else {
                continue;
            };
            let known = silences.entry(cluster.clone()).or_default();
            for (id, silence) in upstream.silences() {
                known.entry(id).or_insert(silence);
            }
        }
        silences
    }

    /// Silences with their cluster, expiry and the number of alerts each
    /// one currently silences. An alert counts once per cluster.
    pub fn managed_silences(&self, now: DateTime<Utc>) -> Vec<ManagedSilence> {
        let mut counts: HashMap<(String, String), usize> = HashMap::new();
        for group in self.dedup_alerts() {
            for alert in &group.alerts {
                let mut seen = BTreeSet::new();
                for am in &alert.alertmanager {
                    for id in &am.silenced_by {
                        if seen.insert((am.cluster.clone(), id.clone())) {
                            *counts.entry((am.cluster.clone(), id.clone())).or_default() += 1;
                        }
                    }
                }
            }
        }

        self.dedup_silences()
            .into_iter()
            .flat_map(|(cluster, silences)| {
                let counts = &counts;
                silences.into_values().map(move |silence| ManagedSilence {
                    alert_count: counts.get(&(cluster.clone(), silence.id.clone())).copied().unwrap_or_default(),
                    is_expired: silence.is_expired_at(now),
                    cluster: cluster.clone(),
                    silence,
                })
            })
            .collect()
    }

    /// Upstream health and connection details for the alerts response.
    pub fn summary(&self, prefix: &str) -> UpstreamsSummary {
        let instances: Vec<UpstreamStatus> = self
            .upstreams
            .iter()
            .map(|u| UpstreamStatus {
                name: u.name().to_string(),
                cluster: self.cluster_name(u),
                cluster_members: self.cluster_members(u),
                uri: u.sanitized_uri(),
                public_uri: u.public_uri(prefix),
                readonly: u.config().readonly,
                headers: u.browser_headers(),
                cors_credentials: u.config().cors_credentials.clone(),
                error: u.error(),
                version: u.version(),
            })
            .collect();
        let failed = instances.iter().filter(|i| !i.error.is_empty()).count();
        UpstreamsSummary {
            counters: UpstreamCounters {
                total: instances.len(),
                healthy: instances.len() - failed,
                failed,
            },
            clusters: self.clusters(),
            instances,
        }
    }
}

fn merge_alert(existing: &mut Alert, other: Alert) {
    existing.starts_at = existing.starts_at.min(other.starts_at);
    existing.ends_at = existing.ends_at.max(other.ends_at);
    for id in other.silenced_by {
        if !existing.silenced_by.contains(&id) {
            existing.silenced_by.push(id);
        }
    }
    for id in other.inhibited_by {
        if !existing.inhibited_by.contains(&id) {
            existing.inhibited_by.push(id);
        }
    }
    existing.silenced_by.sort();
    existing.inhibited_by.sort();
    existing.alertmanager.extend(other.alertmanager);
}
