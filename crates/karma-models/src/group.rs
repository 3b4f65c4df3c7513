//! Alert groups.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, AlertState};
use crate::annotation::Annotation;
use crate::fingerprint::{group_id, sha1_hex};
use crate::Labels;

/// Number of alerts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCount {
    /// Unprocessed alerts.
    pub unprocessed: usize,
    /// Active alerts.
    pub active: usize,
    /// Suppressed alerts.
    pub suppressed: usize,
}

impl StateCount {
    /// Counts one alert in `state`.
    pub fn add(&mut self, state: AlertState) {
        match state {
            AlertState::Unprocessed => self.unprocessed += 1,
            AlertState::Active => self.active += 1,
            AlertState::Suppressed => self.suppressed += 1,
        }
    }

    /// Adds every counter of `other`.
    pub fn merge(&mut self, other: &Self) {
        self.unprocessed += other.unprocessed;
        self.active += other.active;
        self.suppressed += other.suppressed;
    }

    /// Sum of all counters.
    pub fn total(&self) -> usize {
        self.unprocessed + self.active + self.suppressed
    }
}

/// Labels and annotations common to every alert in a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shared {
    /// Shared labels.
    pub labels: Labels,
    /// Shared annotations.
    pub annotations: Vec<Annotation>,
}

/// Alerts sharing a receiver and a set of routing labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertGroup {
    /// Group identity, see [`group_id`].
    pub id: String,
    /// Receiver name.
    pub receiver: String,
    /// Labels the upstream grouped by.
    pub labels: Labels,
    /// Member alerts.
    pub alerts: Vec<Alert>,
    /// Alerts per upstream name.
    pub alertmanager_count: BTreeMap<String, usize>,
    /// Alerts per state.
    pub state_count: StateCount,
    /// Fingerprint of member alert content.
    pub hash: String,
    /// Labels and annotations factored out of the alerts.
    pub shared: Shared,
    /// Number of alerts before truncation.
    pub total_alerts: usize,
    /// Newest member `startsAt`.
    #[serde(skip)]
    pub latest_starts_at: DateTime<Utc>,
}

impl AlertGroup {
    /// Creates an empty group and computes its ID.
    pub fn new(receiver: impl Into<String>, labels: Labels) -> Self {
        let receiver = receiver.into();
        Self {
            id: group_id(&receiver, &labels),
            receiver,
            labels,
            ..Default::default()
        }
    }

    /// Sorts alerts newest first with a label fingerprint tiebreak.
    pub fn sort_alerts(&mut self) {
        self.alerts.sort_by(Alert::display_order);
    }

    /// Newest `startsAt` among member alerts.
    pub fn find_latest_starts_at(&self) -> DateTime<Utc> {
        self.alerts
            .iter()
            .map(|a| a.starts_at)
            .max()
            .unwrap_or_default()
    }

    /// sha1 over the concatenated member content fingerprints.
    pub fn content_fingerprint(&self) -> String {
        let concatenated: String = self.alerts.iter().map(Alert::content_fingerprint).collect();
        sha1_hex(concatenated)
    }

    /// Recounts states and upstreams from the current member alerts.
    pub fn recount(&mut self) {
        self.state_count = StateCount::default();
        self.alertmanager_count.clear();
        for alert in &self.alerts {
            self.state_count.add(alert.state());
            for am in &alert.alertmanager {
                *self.alertmanager_count.entry(am.name.clone()).or_default() += 1;
            }
        }
        self.total_alerts = self.alerts.len();
    }

    /// Sorts alerts and refreshes every derived field.
    pub fn finalize(&mut self) {
        self.sort_alerts();
        self.recount();
        self.latest_starts_at = self.find_latest_starts_at();
        self.hash = self.content_fingerprint();
    }

    /// Moves labels and annotations common to all alerts into `shared`.
    ///
    /// Group labels are always removed from alerts. Labels named in
    /// `ignored` are never shared. A single-alert group shares nothing.
    pub fn dedup_shared_maps(&mut self, ignored: &[String]) {
        self.shared = Shared::default();

        if self.alerts.len() > 1 {
            if let Some((first, rest)) = self.alerts.split_first() {
                for (name, value) in &first.labels {
                    if self.labels.contains_key(name) || ignored.contains(name) {
                        continue;
                    }
                    if rest.iter().all(|a| a.labels.get(name) == Some(value)) {
                        self.shared.labels.insert(name.clone(), value.clone());
                    }
                }
                for annotation in &first.annotations {
                    if rest.iter().all(|a| a.annotations.contains(annotation)) {
                        self.shared.annotations.push(annotation.clone());
                    }
                }
            }
        }

        let group_labels = &self.labels;
        let shared = &self.shared;
        for alert in &mut self.alerts {
            alert.labels.retain(|name, value| {
                group_labels.get(name) != Some(value) && shared.labels.get(name) != Some(value)
            });
            alert.annotations.retain(|a| !shared.annotations.contains(a));
        }
    }
}
