//! Client for a single Alertmanager instance.
//!
//! An [`Upstream`] owns one `reqwest` client and the last snapshot pulled
//! through it. [`Upstream::pull`] does all network I/O without holding any
//! lock and swaps the finished snapshot in at the end, so readers always see
//! either the previous or the new state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::Engine;
use karma_models::{
    Alert, AlertGroup, AlertmanagerInstance, Autocomplete, LabelsColorMap, Silence,
    autocomplete::merge_hints,
};
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, UpstreamError};
use crate::mapper::{self, Mapper, RawGroup, RemoteStatus};
use crate::transform::{Transforms, detect_links};
use crate::uri::{BasicAuth, sanitize_uri, split_credentials};

/// Default per-upstream request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(40);

/// TLS settings for talking to an upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM bundle of extra CA certificates.
    pub ca: Option<PathBuf>,
    /// PEM client certificate.
    pub cert: Option<PathBuf>,
    /// PEM (PKCS#8) client key.
    pub key: Option<PathBuf>,
    /// Skip server certificate verification.
    pub insecure_skip_verify: bool,
}

/// Static configuration of one upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamConfig {
    /// Unique name.
    pub name: String,
    /// Cluster name override.
    pub cluster: String,
    /// API base URI, may embed basic auth credentials.
    pub uri: String,
    /// URI browsers should use instead of `uri`.
    pub external_uri: String,
    /// Timeout for each request.
    pub timeout: Duration,
    /// Whether silence writes are proxied through karma.
    pub proxy: bool,
    /// Whether silence writes are disabled.
    pub readonly: bool,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// TLS settings.
    pub tls: TlsConfig,
    /// `credentials` mode browsers should use for direct requests.
    pub cors_credentials: String,
}

impl UpstreamConfig {
    /// A config with defaults for everything but name and URI.
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: String::new(),
            uri: uri.into(),
            external_uri: String::new(),
            timeout: DEFAULT_TIMEOUT,
            proxy: false,
            readonly: false,
            headers: BTreeMap::new(),
            tls: TlsConfig::default(),
            cors_credentials: "include".to_string(),
        }
    }
}

/// Everything learned from one successful pull.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Alert groups with one observation per alert.
    pub groups: Vec<AlertGroup>,
    /// Silences by ID.
    pub silences: BTreeMap<String, Silence>,
    /// Label colors.
    pub colors: LabelsColorMap,
    /// Autocomplete hints.
    pub autocomplete: Vec<Autocomplete>,
    /// Every label name seen.
    pub known_labels: Vec<String>,
    /// Remote status.
    pub status: RemoteStatus,
    /// Error from the last pull, empty when it succeeded.
    pub last_error: String,
}

/// Alert data decoded and transformed during a pull.
#[derive(Debug, Default)]
pub(crate) struct Processed {
    pub groups: Vec<AlertGroup>,
    pub colors: LabelsColorMap,
    pub autocomplete: Vec<Autocomplete>,
    pub known_labels: Vec<String>,
}

/// One Alertmanager and its last pulled snapshot.
pub struct Upstream {
    config: UpstreamConfig,
    base: Url,
    auth: Option<BasicAuth>,
    client: reqwest::Client,
    snapshot: RwLock<Snapshot>,
    cycles: AtomicU64,
    errors: Mutex<BTreeMap<&'static str, u64>>,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("name", &self.config.name)
            .field("uri", &self.sanitized_uri())
            .finish_non_exhaustive()
    }
}

impl Upstream {
    /// Builds the HTTP client for `config`.
    ///
    /// TLS files are read here, so a missing file is reported at startup.
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        if config.name.is_empty() {
            return Err(UpstreamError::Config {
                reason: "alertmanager upstream name can't be empty".to_string(),
            });
        }
        if config.proxy && config.readonly {
            return Err(UpstreamError::Config {
                reason: format!("alertmanager upstream {:?} can't be both proxied and readonly", config.name),
            });
        }
        let (base, auth) = split_credentials(&config.uri)?;
        let client = build_client(&config)?;
        Ok(Self {
            config,
            base,
            auth,
            client,
            snapshot: RwLock::new(Snapshot::default()),
            cycles: AtomicU64::new(0),
            errors: Mutex::new(BTreeMap::new()),
        })
    }

    /// Upstream name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Static configuration.
    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    /// Base URL without credentials, ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Credentials from the configured URI.
    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.auth.as_ref()
    }

    /// The shared HTTP client, reused by the silence proxy.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Configured URI with the password masked.
    pub fn sanitized_uri(&self) -> String {
        sanitize_uri(&self.config.uri)
    }

    /// URI browsers should talk to.
    pub fn public_uri(&self, prefix: &str) -> String {
        if self.config.proxy {
            let prefix = if prefix.ends_with('/') {
                prefix.to_string()
            } else {
                format!("{prefix}/")
            };
            return format!("{prefix}proxy/alertmanager/{}", self.config.name);
        }
        if self.config.external_uri.is_empty() {
            self.config.uri.clone()
        } else {
            self.config.external_uri.clone()
        }
    }

    /// Headers browsers need for direct requests: basic auth from the URI
    /// plus configured headers. Proxied upstreams need none.
    pub fn browser_headers(&self) -> BTreeMap<String, String> {
        if self.config.proxy {
            return BTreeMap::new();
        }
        let mut headers = self.config.headers.clone();
        if let Some(auth) = &self.auth {
            let credentials = format!("{}:{}", auth.username, auth.password.as_deref().unwrap_or_default());
            headers.insert(
                "Authorization".to_string(),
                format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(credentials)),
            );
        }
        headers
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.read().clone()
    }

    /// Copy of the alert groups.
    pub fn alerts(&self) -> Vec<AlertGroup> {
        self.snapshot.read().groups.clone()
    }

    /// Copy of the silences.
    pub fn silences(&self) -> BTreeMap<String, Silence> {
        self.snapshot.read().silences.clone()
    }

    /// Copy of the label colors.
    pub fn colors(&self) -> LabelsColorMap {
        self.snapshot.read().colors.clone()
    }

    /// Copy of the autocomplete hints.
    pub fn autocomplete(&self) -> Vec<Autocomplete> {
        self.snapshot.read().autocomplete.clone()
    }

    /// Copy of the known label names.
    pub fn known_labels(&self) -> Vec<String> {
        self.snapshot.read().known_labels.clone()
    }

    /// Copy of the remote status.
    pub fn status(&self) -> RemoteStatus {
        self.snapshot.read().status.clone()
    }

    /// Remote version, empty before the first pull.
    pub fn version(&self) -> String {
        self.snapshot.read().status.version.clone()
    }

    /// Cluster peer names reported by the remote.
    pub fn peers(&self) -> Vec<String> {
        self.snapshot.read().status.peers.clone()
    }

    /// Last pull error, empty when healthy.
    pub fn error(&self) -> String {
        self.snapshot.read().last_error.clone()
    }

    /// Number of pulls started.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Error counts by endpoint.
    pub fn errors(&self) -> BTreeMap<&'static str, u64> {
        self.errors.lock().clone()
    }

    /// Pulls status, then silences and alerts concurrently, then swaps the
    /// snapshot. A silences failure is reported before an alerts failure.
    ///
    /// `resolve_cluster` names the cluster this upstream belongs to given its
    /// fresh status; the name is stored on every observation.
    pub async fn pull<F>(&self, transforms: &Transforms, resolve_cluster: F) -> Result<()>
    where
        F: Fn(&RemoteStatus) -> String,
    {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        let status = self.fetch_status().await;
        let mapper = mapper::for_version(&status.version);
        debug!(alertmanager = %self.config.name, version = %status.version, mapper = mapper.name(), "Selected API mapper");

        let (silences, raw) = tokio::join!(self.pull_silences(mapper, transforms), self.pull_alerts(mapper));
        let silences = match silences {
            Ok(silences) => silences,
            Err(err) => return Err(self.fail(status, err)),
        };
        let raw = match raw {
            Ok(raw) => raw,
            Err(err) => return Err(self.fail(status, err)),
        };

        let cluster = resolve_cluster(&status);
        let processed = process_groups(&self.config.name, &cluster, raw, &silences, transforms);
        info!(
            alertmanager = %self.config.name,
            groups = processed.groups.len(),
            silences = silences.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Collected alerts"
        );

        *self.snapshot.write() = Snapshot {
            groups: processed.groups,
            silences,
            colors: processed.colors,
            autocomplete: processed.autocomplete,
            known_labels: processed.known_labels,
            status,
            last_error: String::new(),
        };
        Ok(())
    }

    fn fail(&self, status: RemoteStatus, err: UpstreamError) -> UpstreamError {
        warn!(alertmanager = %self.config.name, error = %err, "Alertmanager pull failed");
        if let Some(endpoint) = err.endpoint() {
            *self.errors.lock().entry(endpoint).or_default() += 1;
        }
        *self.snapshot.write() = Snapshot {
            status,
            last_error: err.to_string(),
            ..Default::default()
        };
        err
    }

    /// Tries every mapper's status endpoint, newest first.
    async fn fetch_status(&self) -> RemoteStatus {
        let mut last_error = None;
        for mapper in mapper::all() {
            match self.get("status", mapper.status_path()).await {
                Ok(body) => match mapper.decode_status(&body) {
                    Ok(status) => return status,
                    Err(err) => last_error = Some(err),
                },
                Err(err) => last_error = Some(err),
            }
        }
        if let Some(err) = last_error {
            warn!(alertmanager = %self.config.name, error = %err, "Failed to detect Alertmanager version, assuming latest");
        }
        *self.errors.lock().entry("status").or_default() += 1;
        RemoteStatus::fallback()
    }

    async fn pull_silences(&self, mapper: &dyn Mapper, transforms: &Transforms) -> Result<BTreeMap<String, Silence>> {
        let body = self.get("silences", mapper.silences_path()).await?;
        let mut silences = BTreeMap::new();
        for mut silence in mapper.decode_silences(&body)? {
            detect_links(&transforms.link_detect, &mut silence);
            silences.insert(silence.id.clone(), silence);
        }
        Ok(silences)
    }

    async fn pull_alerts(&self, mapper: &dyn Mapper) -> Result<Vec<RawGroup>> {
        let body = self.get("alerts", mapper.alerts_path()).await?;
        mapper.decode_alerts(&body)
    }

    async fn get(&self, endpoint: &'static str, path: &str) -> Result<Vec<u8>> {
        let url = self.base.join(path).map_err(|e| UpstreamError::Config {
            reason: format!("can't build {endpoint} url: {e}"),
        })?;
        let fetch_error = |reason: String| UpstreamError::Fetch {
            endpoint,
            uri: sanitize_uri(url.as_str()),
            reason,
        };

        let mut request = self.client.get(url.clone());
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.username, auth.password.as_deref());
        }
        let response = request.send().await.map_err(|e| fetch_error(e.to_string()))?;
        let response = response.error_for_status().map_err(|e| fetch_error(e.to_string()))?;
        let body = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// A `reqwest` client builder with `timeout` and the TLS settings applied.
///
/// CA and client certificate files are read immediately. Errors are plain
/// reasons so callers can say which config section they came from.
pub fn tls_client_builder(timeout: Duration, tls: &TlsConfig) -> std::result::Result<reqwest::ClientBuilder, String> {
    let mut builder = reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(tls.insecure_skip_verify);

    if let Some(ca) = &tls.ca {
        let pem = std::fs::read(ca).map_err(|e| format!("can't read CA file {}: {e}", ca.display()))?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| format!("invalid CA file {}: {e}", ca.display()))?;
        builder = builder.add_root_certificate(cert);
    }

    match (&tls.cert, &tls.key) {
        (Some(cert), Some(key)) => {
            let cert_pem = std::fs::read(cert).map_err(|e| format!("can't read cert file {}: {e}", cert.display()))?;
            let key_pem = std::fs::read(key).map_err(|e| format!("can't read key file {}: {e}", key.display()))?;
            let identity =
                reqwest::Identity::from_pkcs8_pem(&cert_pem, &key_pem).map_err(|e| format!("invalid client certificate: {e}"))?;
            builder = builder.identity(identity);
        }
        (None, None) => {}
        _ => return Err("tls cert and key must be set together".to_string()),
    }

    Ok(builder)
}

fn build_client(config: &UpstreamConfig) -> Result<reqwest::Client> {
    let config_error = |reason: String| UpstreamError::Config {
        reason: format!("alertmanager upstream {:?}: {reason}", config.name),
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| config_error(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| config_error(format!("invalid value for header {name}: {e}")))?;
        headers.insert(name, value);
    }

    let builder = tls_client_builder(config.timeout, &config.tls)
        .map_err(config_error)?
        .default_headers(headers);

    builder.build().map_err(|e| config_error(e.to_string()))
}

/// Applies transforms to decoded groups and attaches one observation per
/// alert.
///
/// Groups routed to a stripped receiver are dropped. Alerts identical after
/// transforms are kept once per group.
pub(crate) fn process_groups(
    name: &str,
    cluster: &str,
    raw: Vec<RawGroup>,
    silences: &BTreeMap<String, Silence>,
    transforms: &Transforms,
) -> Processed {
    let mut groups: BTreeMap<String, AlertGroup> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut colors = LabelsColorMap::new();
    let mut known_labels = BTreeSet::new();

    for raw_group in raw {
        if !transforms.receivers.allows(&raw_group.receiver) {
            continue;
        }
        let group_labels = transforms.labels.apply_labels(&raw_group.labels);
        let group = AlertGroup::new(raw_group.receiver.clone(), group_labels);
        let group = groups.entry(group.id.clone()).or_insert(group);

        for raw_alert in raw_group.alerts {
            let labels = transforms.labels.apply_labels(&raw_alert.labels);
            let annotations = transforms.annotations.apply_annotations(&raw_alert.annotations);

            let mut alert = Alert::new(labels, raw_group.receiver.clone(), raw_alert.starts_at);
            alert.annotations = transforms.annotation_rules.build(&annotations);
            alert.ends_at = raw_alert.ends_at;
            alert.generator_url = raw_alert.generator_url.clone();
            alert.silenced_by = raw_alert.silenced_by.clone();
            alert.inhibited_by = raw_alert.inhibited_by.clone();
            alert.alertmanager.push(AlertmanagerInstance {
                name: name.to_string(),
                cluster: cluster.to_string(),
                state: raw_alert.state,
                starts_at: raw_alert.starts_at,
                ends_at: raw_alert.ends_at,
                source: raw_alert.generator_url,
                fingerprint: raw_alert.fingerprint,
                silences: raw_alert
                    .silenced_by
                    .iter()
                    .filter_map(|id| silences.get(id).cloned())
                    .collect(),
                silenced_by: raw_alert.silenced_by,
                inhibited_by: raw_alert.inhibited_by,
            });

            if !seen.insert((group.id.clone(), alert.content_fingerprint())) {
                continue;
            }

            transforms.colors.color_label(&mut colors, "@receiver", &alert.receiver);
            for (label, value) in &alert.labels {
                transforms.colors.color_label(&mut colors, label, value);
                known_labels.insert(label.clone());
            }
            group.alerts.push(alert);
        }
    }

    let mut groups: Vec<AlertGroup> = groups.into_values().filter(|g| !g.alerts.is_empty()).collect();
    for group in &mut groups {
        group.finalize();
    }
    for label in ["@alertmanager", "@cluster"] {
        let value = if label == "@alertmanager" { name } else { cluster };
        if !groups.is_empty() && !value.is_empty() {
            transforms.colors.color_label(&mut colors, label, value);
        }
    }

    let autocomplete = merge_hints(groups.iter().map(|g| karma_filters::build_autocomplete(&g.alerts)));
    Processed {
        groups,
        colors,
        autocomplete,
        known_labels: known_labels.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::RawAlert;
    use crate::transform::{ColorRules, KeepStrip};
    use chrono::{TimeZone, Utc};
    use karma_models::{AlertState, Labels};
    use std::collections::HashMap;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
    }

    fn raw_alert(pairs: &[(&str, &str)], state: AlertState, silenced_by: &[&str]) -> RawAlert {
        RawAlert {
            labels: labels(pairs),
            annotations: HashMap::from([("summary".to_string(), "it broke".to_string())]),
            starts_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            generator_url: "http://prom/graph".to_string(),
            fingerprint: "f00".to_string(),
            state,
            silenced_by: silenced_by.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }

    fn raw_group(receiver: &str, alerts: Vec<RawAlert>) -> RawGroup {
        RawGroup {
            receiver: receiver.to_string(),
            labels: labels(&[("alertname", "Down")]),
            alerts,
        }
    }

    #[test]
    fn attaches_observation_and_silences() {
        let silence = Silence {
            id: "s1".to_string(),
            comment: "maintenance".to_string(),
            ..Default::default()
        };
        let silences = BTreeMap::from([("s1".to_string(), silence)]);
        let raw = vec![raw_group(
            "by-name",
            vec![raw_alert(&[("alertname", "Down"), ("instance", "a")], AlertState::Suppressed, &["s1", "gone"])],
        )];

        let out = process_groups("am1", "ha", raw, &silences, &Transforms::default());
        assert_eq!(out.groups.len(), 1);
        let alert = &out.groups[0].alerts[0];
        assert_eq!(alert.state(), AlertState::Suppressed);
        assert_eq!(alert.annotations[0].name, "summary");
        let am = &alert.alertmanager[0];
        assert_eq!(am.name, "am1");
        assert_eq!(am.cluster, "ha");
        assert_eq!(am.source, "http://prom/graph");
        assert_eq!(am.silences.len(), 1);
        assert_eq!(am.silences[0].comment, "maintenance");
        assert_eq!(out.known_labels, vec!["alertname", "instance"]);
        assert!(out.autocomplete.iter().any(|h| h.value == "instance=a"));
        assert_eq!(out.groups[0].state_count.suppressed, 1);
    }

    #[test]
    fn dedups_identical_alerts_and_merges_groups() {
        let alert = raw_alert(&[("alertname", "Down")], AlertState::Active, &[]);
        let raw = vec![
            raw_group("by-name", vec![alert.clone(), alert.clone()]),
            raw_group("by-name", vec![alert]),
        ];
        let out = process_groups("am1", "am1", raw, &BTreeMap::new(), &Transforms::default());
        assert_eq!(out.groups.len(), 1);
        assert_eq!(out.groups[0].alerts.len(), 1);
        assert_eq!(out.groups[0].total_alerts, 1);
    }

    #[test]
    fn applies_strip_transforms() {
        let transforms = Transforms {
            labels: KeepStrip::names(vec![], vec!["instance".to_string()]),
            receivers: KeepStrip::names(vec![], vec!["blackhole".to_string()]),
            annotations: KeepStrip::names(vec![], vec!["summary".to_string()]),
            colors: ColorRules {
                unique: vec!["@receiver".to_string(), "@alertmanager".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let raw = vec![
            raw_group("by-name", vec![raw_alert(&[("alertname", "Down"), ("instance", "a")], AlertState::Active, &[])]),
            raw_group("blackhole", vec![raw_alert(&[("alertname", "Down")], AlertState::Active, &[])]),
        ];
        let out = process_groups("am1", "am1", raw, &BTreeMap::new(), &transforms);
        assert_eq!(out.groups.len(), 1);
        let alert = &out.groups[0].alerts[0];
        assert!(!alert.labels.contains_key("instance"));
        assert!(alert.annotations.is_empty());
        assert!(out.colors["@receiver"].contains_key("by-name"));
        assert!(out.colors["@alertmanager"].contains_key("am1"));
    }

    #[test]
    fn public_uri_and_headers() {
        let mut config = UpstreamConfig::new("am1", "http://bob:secret@am:9093");
        let upstream = Upstream::new(config.clone()).unwrap();
        assert_eq!(upstream.public_uri("/"), "http://bob:secret@am:9093");
        assert_eq!(upstream.sanitized_uri(), "http://bob:xxx@am:9093");
        assert_eq!(upstream.browser_headers()["Authorization"], "Basic Ym9iOnNlY3JldA==");

        config.external_uri = "https://am.example.com".to_string();
        assert_eq!(Upstream::new(config.clone()).unwrap().public_uri("/"), "https://am.example.com");

        config.proxy = true;
        let proxied = Upstream::new(config).unwrap();
        assert_eq!(proxied.public_uri("/karma"), "/karma/proxy/alertmanager/am1");
        assert!(proxied.browser_headers().is_empty());
    }

    #[tokio::test]
    async fn fetches_silences_and_alerts_together() {
        use axum::routing::get;
        use std::sync::Arc;
        use tokio::sync::Barrier;

        // Each handler waits for the other request to arrive.
        let barrier = Arc::new(Barrier::new(2));
        let silences_barrier = Arc::clone(&barrier);
        let router = axum::Router::new()
            .route(
                "/api/v2/status",
                get(|| async { axum::Json(serde_json::json!({"versionInfo": {"version": "0.24.0"}, "cluster": {"peers": []}})) }),
            )
            .route(
                "/api/v2/silences",
                get(move || {
                    let barrier = Arc::clone(&silences_barrier);
                    async move {
                        barrier.wait().await;
                        axum::Json(serde_json::json!([]))
                    }
                }),
            )
            .route(
                "/api/v2/alerts/groups",
                get(move || {
                    let barrier = Arc::clone(&barrier);
                    async move {
                        barrier.wait().await;
                        axum::Json(serde_json::json!([]))
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });

        let mut config = UpstreamConfig::new("am1", format!("http://{addr}"));
        config.timeout = Duration::from_secs(2);
        let upstream = Upstream::new(config).unwrap();
        upstream.pull(&Transforms::default(), |_| "am1".to_string()).await.unwrap();
        assert_eq!(upstream.error(), "");
        assert_eq!(upstream.version(), "0.24.0");
    }

    #[test]
    fn rejects_invalid_configs() {
        let mut config = UpstreamConfig::new("am1", "http://am:9093");
        config.proxy = true;
        config.readonly = true;
        assert!(Upstream::new(config).is_err());

        let mut config = UpstreamConfig::new("am1", "http://am:9093");
        config.headers.insert("bad header".to_string(), "x".to_string());
        assert!(Upstream::new(config).is_err());

        assert!(Upstream::new(UpstreamConfig::new("", "http://am:9093")).is_err());
    }
}
