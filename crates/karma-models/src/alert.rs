//! Alerts and their per-upstream observations.
//!
//! An [`Alert`] is identified by its label fingerprint. Every upstream that
//! reports the alert contributes one [`AlertmanagerInstance`]; the alert
//! state is always derived from those observations.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::annotation::Annotation;
use crate::fingerprint::{labels_fingerprint, sha1_hex};
use crate::silence::Silence;
use crate::Labels;

/// State of an alert as reported by Alertmanager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    /// Not yet processed by Alertmanager.
    #[default]
    Unprocessed,
    /// Firing and not suppressed.
    Active,
    /// Silenced or inhibited.
    Suppressed,
}

impl AlertState {
    /// All states in response order.
    pub const ALL: [Self; 3] = [Self::Unprocessed, Self::Active, Self::Suppressed];

    /// Returns the state as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Active => "active",
            Self::Suppressed => "suppressed",
        }
    }

    /// Parses one of the three state literals.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unprocessed" => Some(Self::Unprocessed),
            "active" => Some(Self::Active),
            "suppressed" => Some(Self::Suppressed),
            _ => None,
        }
    }

    /// Folds a set of observed states: active beats suppressed beats unprocessed.
    pub fn from_observed<I: IntoIterator<Item = Self>>(states: I) -> Self {
        let mut result = Self::Unprocessed;
        for state in states {
            match state {
                Self::Active => return Self::Active,
                Self::Suppressed => result = Self::Suppressed,
                Self::Unprocessed => {}
            }
        }
        result
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One upstream's view of an alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerInstance {
    /// Upstream name.
    pub name: String,
    /// Cluster the upstream belongs to.
    pub cluster: String,
    /// State reported by this upstream.
    pub state: AlertState,
    /// Start time reported by this upstream.
    pub starts_at: DateTime<Utc>,
    /// End time reported by this upstream.
    pub ends_at: DateTime<Utc>,
    /// Generator URL reported by this upstream.
    pub source: String,
    /// Alertmanager's own fingerprint for the alert.
    pub fingerprint: String,
    /// IDs of silences muting the alert on this upstream.
    pub silenced_by: Vec<String>,
    /// Fingerprints of alerts inhibiting this alert on this upstream.
    pub inhibited_by: Vec<String>,
    /// Copies of the silences referenced by `silenced_by`.
    #[serde(skip)]
    pub silences: Vec<Silence>,
}

/// A deduplicated alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alert {
    /// Label fingerprint, see [`labels_fingerprint`].
    pub id: String,
    /// Annotations in presentation order.
    pub annotations: Vec<Annotation>,
    /// Label set.
    pub labels: Labels,
    /// Earliest start time across observations.
    pub starts_at: DateTime<Utc>,
    /// Latest end time across observations.
    pub ends_at: DateTime<Utc>,
    /// Receiver the alert was routed to.
    pub receiver: String,
    /// Source URL.
    pub generator_url: String,
    /// Sorted silence IDs.
    pub silenced_by: Vec<String>,
    /// Sorted inhibiting alert fingerprints.
    pub inhibited_by: Vec<String>,
    /// Per-upstream observations.
    pub alertmanager: Vec<AlertmanagerInstance>,
}

impl Alert {
    /// Creates an alert with the given labels and a matching `id`.
    pub fn new(labels: Labels, receiver: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        let mut alert = Self {
            labels,
            receiver: receiver.into(),
            starts_at,
            ..Default::default()
        };
        alert.update_fingerprints();
        alert
    }

    /// Recomputes `id` from the current labels.
    pub fn update_fingerprints(&mut self) {
        self.id = labels_fingerprint(&self.labels);
    }

    /// State derived from the observations.
    pub fn state(&self) -> AlertState {
        AlertState::from_observed(self.alertmanager.iter().map(|am| am.state))
    }

    /// Fingerprint of everything a client renders for this alert.
    ///
    /// Covers annotations, labels, start time, state, receiver and every
    /// observation. The alert level generator URL, `silenced_by` and
    /// `inhibited_by` are left out.
    pub fn content_fingerprint(&self) -> String {
        let mut buf = String::new();
        for a in &self.annotations {
            let _ = write!(buf, "{}\u{1}{}\u{1}{}{}{}\u{2}", a.name, a.value, a.visible, a.is_link, a.is_action);
        }
        buf.push('\u{3}');
        for (name, value) in &self.labels {
            let _ = write!(buf, "{name}\u{1}{value}\u{2}");
        }
        buf.push('\u{3}');
        buf.push_str(&self.starts_at.to_rfc3339_opts(SecondsFormat::Nanos, true));
        buf.push('\u{3}');
        buf.push_str(self.state().as_str());
        buf.push('\u{3}');
        for am in &self.alertmanager {
            let _ = write!(
                buf,
                "{}\u{1}{}\u{1}{}\u{1}{}\u{1}{}\u{1}{}\u{1}{}\u{1}{}\u{2}",
                am.fingerprint,
                am.name,
                am.cluster,
                am.state,
                am.starts_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                am.source,
                am.silenced_by.join(","),
                am.inhibited_by.join(","),
            );
        }
        buf.push('\u{3}');
        buf.push_str(&self.receiver);
        sha1_hex(buf)
    }

    /// Ordering used inside groups: newest first, then by label fingerprint.
    pub fn display_order(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.starts_at.cmp(&a.starts_at).then_with(|| a.id.cmp(&b.id))
    }
}

impl Serialize for Alert {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Alert", 11)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("annotations", &self.annotations)?;
        s.serialize_field("labels", &self.labels)?;
        s.serialize_field("startsAt", &self.starts_at)?;
        s.serialize_field("endsAt", &self.ends_at)?;
        s.serialize_field("state", &self.state())?;
        s.serialize_field("receiver", &self.receiver)?;
        s.serialize_field("generatorURL", &self.generator_url)?;
        s.serialize_field("silencedBy", &self.silenced_by)?;
        s.serialize_field("inhibitedBy", &self.inhibited_by)?;
        s.serialize_field("alertmanager", &self.alertmanager)?;
        s.end()
    }
}
