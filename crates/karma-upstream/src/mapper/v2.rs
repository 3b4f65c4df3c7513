//! Alertmanager `/api/v2` (OpenAPI), used by 0.17 and newer.

use chrono::{DateTime, Utc};
use karma_models::{Labels, Silence};
use once_cell::sync::Lazy;
use semver::VersionReq;
use serde::Deserialize;

use super::{parse_error, Mapper, RawGroup, RemoteStatus, WireAlert, WireMatcher};
use crate::error::{Result, UpstreamError};

static RANGE: Lazy<VersionReq> = Lazy::new(|| VersionReq::parse(">=0.17.0").unwrap_or_else(|_| unreachable!()));

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Peer {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Cluster {
    name: String,
    peers: Option<Vec<Peer>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VersionInfo {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    #[serde(default)]
    version_info: VersionInfo,
    #[serde(default)]
    cluster: Cluster,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Receiver {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Group {
    #[serde(default)]
    labels: Labels,
    #[serde(default)]
    receiver: Receiver,
    #[serde(default)]
    alerts: Vec<WireAlert>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GettableSilence {
    id: String,
    #[serde(default)]
    matchers: Vec<WireMatcher>,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_by: String,
    #[serde(default)]
    comment: String,
}

/// Mapper for the OpenAPI based API.
#[derive(Debug, Clone, Copy, Default)]
pub struct V2Mapper;

impl Mapper for V2Mapper {
    fn name(&self) -> &'static str {
        "v2"
    }

    fn version_range(&self) -> &VersionReq {
        &RANGE
    }

    fn status_path(&self) -> &'static str {
        "api/v2/status"
    }

    fn alerts_path(&self) -> &'static str {
        "api/v2/alerts/groups"
    }

    fn silences_path(&self) -> &'static str {
        "api/v2/silences"
    }

    fn decode_status(&self, body: &[u8]) -> Result<RemoteStatus> {
        let status: Status = serde_json::from_slice(body).map_err(|e| parse_error("status", &e))?;
        if status.version_info.version.is_empty() {
            return Err(UpstreamError::Parse {
                endpoint: "status",
                reason: "no version information in status response".to_string(),
            });
        }
        Ok(RemoteStatus {
            version: status.version_info.version,
            id: status.cluster.name,
            peers: status
                .cluster
                .peers
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.name)
                .collect(),
        })
    }

    fn decode_alerts(&self, body: &[u8]) -> Result<Vec<RawGroup>> {
        let groups: Vec<Group> = serde_json::from_slice(body).map_err(|e| parse_error("alerts", &e))?;
        Ok(groups
            .into_iter()
            .map(|g| RawGroup {
                receiver: g.receiver.name,
                labels: g.labels,
                alerts: g.alerts.into_iter().map(Into::into).collect(),
            })
            .collect())
    }

    fn decode_silences(&self, body: &[u8]) -> Result<Vec<Silence>> {
        let silences: Vec<GettableSilence> =
            serde_json::from_slice(body).map_err(|e| parse_error("silences", &e))?;
        Ok(silences
            .into_iter()
            .map(|s| Silence {
                id: s.id,
                matchers: s.matchers.into_iter().map(Into::into).collect(),
                starts_at: s.starts_at,
                ends_at: s.ends_at,
                created_at: s.updated_at.unwrap_or(s.starts_at),
                created_by: s.created_by,
                comment: s.comment,
                ..Default::default()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karma_models::AlertState;

    #[test]
    fn decodes_status() {
        let body = br#"{
            "cluster":{"name":"01ABC","status":"ready","peers":[{"name":"01ABC","address":"10.0.0.1:9094"}]},
            "versionInfo":{"version":"0.24.0","branch":"HEAD"},
            "uptime":"2024-01-01T00:00:00Z"
        }"#;
        let status = V2Mapper.decode_status(body).unwrap();
        assert_eq!(status.version, "0.24.0");
        assert_eq!(status.peers, vec!["01ABC"]);
    }

    #[test]
    fn status_with_null_peers() {
        let body = br#"{"cluster":{"name":"x","peers":null},"versionInfo":{"version":"0.20.0"}}"#;
        assert!(V2Mapper.decode_status(body).unwrap().peers.is_empty());
    }

    #[test]
    fn decodes_alert_groups() {
        let body = br#"[{
            "labels":{"alertname":"Down"},
            "receiver":{"name":"by-name"},
            "alerts":[{
                "labels":{"alertname":"Down","instance":"a"},
                "annotations":{},
                "startsAt":"2024-01-01T00:00:00Z",
                "endsAt":"2024-01-01T01:00:00Z",
                "updatedAt":"2024-01-01T00:00:00Z",
                "generatorURL":"http://prom/graph",
                "fingerprint":"0123",
                "receivers":[{"name":"by-name"}],
                "status":{"state":"active","silencedBy":[],"inhibitedBy":["z","y"]}
            }]
        }]"#;
        let groups = V2Mapper.decode_alerts(body).unwrap();
        assert_eq!(groups[0].receiver, "by-name");
        let alert = &groups[0].alerts[0];
        assert_eq!(alert.state, AlertState::Active);
        assert_eq!(alert.fingerprint, "0123");
        assert_eq!(alert.inhibited_by, vec!["y", "z"]);
    }

    #[test]
    fn decodes_silences() {
        let body = br#"[{
            "id":"abc",
            "status":{"state":"active"},
            "updatedAt":"2024-01-01T00:00:00Z",
            "comment":"JIRA-1",
            "createdBy":"me",
            "startsAt":"2024-01-01T00:00:00Z",
            "endsAt":"2024-01-02T00:00:00Z",
            "matchers":[{"name":"job","value":"node","isRegex":false,"isEqual":false}]
        }]"#;
        let silences = V2Mapper.decode_silences(body).unwrap();
        assert_eq!(silences[0].comment, "JIRA-1");
        assert!(!silences[0].matchers[0].is_equal);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            V2Mapper.decode_alerts(b"{"),
            Err(UpstreamError::Parse { endpoint: "alerts", .. })
        ));
    }
}
