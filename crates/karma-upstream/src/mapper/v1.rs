//! Alertmanager `/api/v1`, used by 0.15 and 0.16.

use chrono::{DateTime, Utc};
use karma_models::{Labels, Silence};
use once_cell::sync::Lazy;
use semver::VersionReq;
use serde::Deserialize;

use super::{parse_error, Mapper, RawGroup, RemoteStatus, WireAlert, WireMatcher};
use crate::error::{Result, UpstreamError};

static RANGE: Lazy<VersionReq> =
    Lazy::new(|| VersionReq::parse(">=0.15.0, <0.17.0").unwrap_or_else(|_| unreachable!()));

/// Every v1 response is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    error: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self, endpoint: &'static str) -> Result<T> {
        if self.status != "success" {
            return Err(UpstreamError::Parse {
                endpoint,
                reason: format!("response status is {:?}: {}", self.status, self.error),
            });
        }
        self.data.ok_or_else(|| UpstreamError::Parse {
            endpoint,
            reason: "response has no data".to_string(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Peer {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ClusterStatus {
    name: String,
    peers: Vec<Peer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VersionInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusData {
    #[serde(default)]
    version_info: VersionInfo,
    #[serde(default)]
    cluster_status: ClusterStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RouteOpts {
    receiver: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
    #[serde(default)]
    route_opts: RouteOpts,
    #[serde(default)]
    alerts: Vec<WireAlert>,
}

#[derive(Debug, Deserialize)]
struct Group {
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSilence {
    id: String,
    #[serde(default)]
    matchers: Vec<WireMatcher>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_by: String,
    #[serde(default)]
    comment: String,
}

/// Mapper for the pre-OpenAPI API.
#[derive(Debug, Clone, Copy, Default)]
pub struct V1Mapper;

impl Mapper for V1Mapper {
    fn name(&self) -> &'static str {
        "v1"
    }

    fn version_range(&self) -> &VersionReq {
        &RANGE
    }

    fn status_path(&self) -> &'static str {
        "api/v1/status"
    }

    fn alerts_path(&self) -> &'static str {
        "api/v1/alerts/groups"
    }

    fn silences_path(&self) -> &'static str {
        "api/v1/silences"
    }

    fn decode_status(&self, body: &[u8]) -> Result<RemoteStatus> {
        let envelope: Envelope<StatusData> =
            serde_json::from_slice(body).map_err(|e| parse_error("status", &e))?;
        let data = envelope.into_data("status")?;
        if data.version_info.version.is_empty() {
            return Err(UpstreamError::Parse {
                endpoint: "status",
                reason: "no version information in status response".to_string(),
            });
        }
        Ok(RemoteStatus {
            version: data.version_info.version,
            id: data.cluster_status.name,
            peers: data.cluster_status.peers.into_iter().map(|p| p.name).collect(),
        })
    }

    fn decode_alerts(&self, body: &[u8]) -> Result<Vec<RawGroup>> {
        let envelope: Envelope<Vec<Group>> =
            serde_json::from_slice(body).map_err(|e| parse_error("alerts", &e))?;
        let mut groups = Vec::new();
        for group in envelope.into_data("alerts")? {
            for block in group.blocks {
                groups.push(RawGroup {
                    receiver: block.route_opts.receiver,
                    labels: group.labels.clone(),
                    alerts: block.alerts.into_iter().map(Into::into).collect(),
                });
            }
        }
        Ok(groups)
    }

    fn decode_silences(&self, body: &[u8]) -> Result<Vec<Silence>> {
        let envelope: Envelope<Vec<WireSilence>> =
            serde_json::from_slice(body).map_err(|e| parse_error("silences", &e))?;
        Ok(envelope
            .into_data("silences")?
            .into_iter()
            .map(|s| Silence {
                id: s.id,
                matchers: s.matchers.into_iter().map(Into::into).collect(),
                starts_at: s.starts_at,
                ends_at: s.ends_at,
                created_at: s.created_at.or(s.updated_at).unwrap_or_default(),
                created_by: s.created_by,
                comment: s.comment,
                ..Default::default()
            })
            .collect())
    }
}
