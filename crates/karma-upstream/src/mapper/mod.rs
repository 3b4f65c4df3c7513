//! Version specific decoders for the Alertmanager HTTP API.
//!
//! Each mapper knows the endpoint paths of one API generation and turns its
//! payloads into upstream-neutral values. The upstream client picks a mapper
//! from the version reported by the status endpoint.

pub mod v1;
pub mod v2;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use karma_models::{AlertState, Labels, Silence};
use semver::{Version, VersionReq};
use serde::Deserialize;

use crate::error::Result;

/// Version assumed when the status endpoint can't be read.
pub const FALLBACK_VERSION: &str = "999.0.0";

/// What the status endpoint says about the remote instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteStatus {
    /// Alertmanager version string as reported.
    pub version: String,
    /// Cluster peer name of the instance itself.
    pub id: String,
    /// Names of every cluster peer, including itself.
    pub peers: Vec<String>,
}

impl RemoteStatus {
    /// Status used when the endpoint failed, selecting the newest mapper.
    pub fn fallback() -> Self {
        Self {
            version: FALLBACK_VERSION.to_string(),
            ..Default::default()
        }
    }
}

/// One alert as decoded from an upstream, before transforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAlert {
    /// Alert labels.
    pub labels: Labels,
    /// Raw annotation name to value map.
    pub annotations: HashMap<String, String>,
    /// Start time.
    pub starts_at: DateTime<Utc>,
    /// End time.
    pub ends_at: DateTime<Utc>,
    /// Link back to the alert source.
    pub generator_url: String,
    /// Upstream fingerprint.
    pub fingerprint: String,
    /// State as reported by the upstream.
    pub state: AlertState,
    /// Sorted silence IDs.
    pub silenced_by: Vec<String>,
    /// Sorted inhibiting alert fingerprints.
    pub inhibited_by: Vec<String>,
}

/// One alert group as decoded from an upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawGroup {
    /// Receiver the group was routed to.
    pub receiver: String,
    /// Grouping labels.
    pub labels: Labels,
    /// Member alerts.
    pub alerts: Vec<RawAlert>,
}

/// Decoder for one generation of the Alertmanager API.
pub trait Mapper: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Supported version range.
    fn version_range(&self) -> &VersionReq;

    /// Path of the status endpoint, relative to the upstream URI.
    fn status_path(&self) -> &'static str;

    /// Path of the alert groups endpoint.
    fn alerts_path(&self) -> &'static str;

    /// Path of the silences endpoint.
    fn silences_path(&self) -> &'static str;

    /// Decodes a status response.
    fn decode_status(&self, body: &[u8]) -> Result<RemoteStatus>;

    /// Decodes an alert groups response.
    fn decode_alerts(&self, body: &[u8]) -> Result<Vec<RawGroup>>;

    /// Decodes a silences response.
    fn decode_silences(&self, body: &[u8]) -> Result<Vec<Silence>>;

    /// Whether `version` is handled by this mapper.
    fn supports(&self, version: &Version) -> bool {
        self.version_range().matches(version)
    }
}

static V1: v1::V1Mapper = v1::V1Mapper;
static V2: v2::V2Mapper = v2::V2Mapper;

/// Every mapper, newest first.
pub fn all() -> [&'static dyn Mapper; 2] {
    [&V2, &V1]
}

/// Parses a reported version leniently.
///
/// Pre-release and build suffixes are dropped and two part versions such as
/// `0.18` are padded with a zero patch number.
pub fn parse_version(version: &str) -> Option<Version> {
    let core = version
        .trim()
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    let mut parts: Vec<&str> = core.split('.').collect();
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&parts.join(".")).ok()
}

/// Picks the mapper for a reported version, falling back to the newest one.
pub fn for_version(version: &str) -> &'static dyn Mapper {
    let [newest, ..] = all();
    parse_version(version)
        .and_then(|v| all().into_iter().find(|m| m.supports(&v)))
        .unwrap_or(newest)
}

/// Parses a state string, treating anything unknown as unprocessed.
pub(crate) fn parse_state(state: &str) -> AlertState {
    AlertState::parse(state).unwrap_or_default()
}

/// A matcher as both API generations encode it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireMatcher {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default)]
    pub is_equal: Option<bool>,
}

impl From<WireMatcher> for karma_models::SilenceMatcher {
    fn from(m: WireMatcher) -> Self {
        Self {
            name: m.name,
            value: m.value,
            is_regex: m.is_regex,
            is_equal: m.is_equal.unwrap_or(true),
        }
    }
}

/// Alert status block shared by both API generations.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireAlertStatus {
    pub state: String,
    pub silenced_by: Option<Vec<String>>,
    pub inhibited_by: Option<Vec<String>>,
}

/// Alert body shared by both API generations.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireAlert {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "generatorURL")]
    pub generator_url: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub status: WireAlertStatus,
}

impl From<WireAlert> for RawAlert {
    fn from(a: WireAlert) -> Self {
        let mut silenced_by = a.status.silenced_by.unwrap_or_default();
        let mut inhibited_by = a.status.inhibited_by.unwrap_or_default();
        silenced_by.sort();
        inhibited_by.sort();
        Self {
            labels: a.labels,
            annotations: a.annotations,
            starts_at: a.starts_at,
            ends_at: a.ends_at.unwrap_or_default(),
            generator_url: a.generator_url,
            fingerprint: a.fingerprint,
            state: parse_state(&a.status.state),
            silenced_by,
            inhibited_by,
        }
    }
}

pub(crate) fn parse_error(endpoint: &'static str, err: &serde_json::Error) -> crate::UpstreamError {
    crate::UpstreamError::Parse {
        endpoint,
        reason: err.to_string(),
    }
}
