//! Alert history from Prometheus.
//!
//! `/history.json` asks for the number of alert state changes per hour over
//! the last day, for a set of Prometheus sources that generated the alerts.
//! Queries run on a fixed pool of workers fed through a bounded channel, and
//! both results and failures are cached for a few minutes per source and
//! label set.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, TimeZone, Utc};
use karma_models::api::{HistoryResponse, OffsetSample};
use karma_models::regex_util::compile_anchored;
use karma_models::{sha1_hex, Labels};
use karma_upstream::tls_client_builder;
use lru::LruCache;
use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::{ClientTls, HistoryRewrite, HistorySection};
use crate::error::{Result, ServerError};

/// How long cached results and failures are reused.
const CACHE_TTL: StdDuration = StdDuration::from_secs(5 * 60);
const RESULTS_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};
const KNOWN_BAD_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};
const QUEUE_SIZE: usize = 1000;
const BUCKETS: i64 = 24;

/// Rewrites a source URI before it is queried.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    source: Regex,
    uri: String,
    headers: BTreeMap<String, String>,
    /// Set when the rule carries its own TLS or proxy settings.
    client: Option<reqwest::Client>,
}

impl RewriteRule {
    /// Compiles `history.rewrite`. Rules with TLS or proxy settings get a
    /// dedicated client using `timeout`.
    pub fn from_config(rules: &[HistoryRewrite], timeout: StdDuration) -> Result<Vec<Self>> {
        rules
            .iter()
            .map(|rule| {
                let config_error = |reason: String| ServerError::Config {
                    reason: format!("history.rewrite rule {:?}: {reason}", rule.source),
                };
                let source = compile_anchored(&rule.source).map_err(|e| config_error(format!("invalid source regex: {e}")))?;
                Ok(Self {
                    source,
                    uri: rule.uri.clone(),
                    headers: rule.headers.clone(),
                    client: rule_client(rule, timeout).map_err(config_error)?,
                })
            })
            .collect()
    }
}

fn rule_client(rule: &HistoryRewrite, timeout: StdDuration) -> std::result::Result<Option<reqwest::Client>, String> {
    if rule.tls == ClientTls::default() && rule.proxy_url.is_empty() {
        return Ok(None);
    }
    let mut builder = tls_client_builder(timeout, &rule.tls.to_tls_config())?;
    if !rule.proxy_url.is_empty() {
        let proxy = reqwest::Proxy::all(&rule.proxy_url)
            .map_err(|e| format!("failed to parse proxy url {:?}: {e}", rule.proxy_url))?;
        builder = builder.proxy(proxy);
    }
    builder.build().map(Some).map_err(|e| e.to_string())
}

/// Where and how to query one source.
#[derive(Debug, Clone)]
struct Target {
    uri: String,
    headers: BTreeMap<String, String>,
    client: Option<reqwest::Client>,
}

/// Rewritten target for `source`. `None` when a rule drops it.
fn rewrite_source(rules: &[RewriteRule], source: &str) -> Option<Target> {
    let source = source.trim_end_matches('/');
    for rule in rules {
        if let Some(captures) = rule.source.captures(source) {
            let mut uri = String::new();
            captures.expand(&rule.uri, &mut uri);
            let uri = uri.trim_end_matches('/').to_string();
            if uri.is_empty() {
                return None;
            }
            return Some(Target {
                uri,
                headers: rule.headers.clone(),
                client: rule.client.clone(),
            });
        }
    }
    Some(Target {
        uri: source.to_string(),
        headers: BTreeMap::new(),
        client: None,
    })
}

fn cache_key(uri: &str, labels: &Labels) -> String {
    let pairs: Vec<String> = labels.iter().map(|(k, v)| format!("{k}={v}")).collect();
    sha1_hex(format!("{uri}\n{}", pairs.join("\n")))
}

type QueryResult = std::result::Result<Vec<OffsetSample>, String>;

struct Job {
    target: Target,
    labels: Labels,
    reply: oneshot::Sender<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct PromResponse<T> {
    status: String,
    data: Option<T>,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Deserialize)]
struct MatrixData {
    #[serde(default)]
    result: Vec<MatrixSeries>,
}

#[derive(Debug, Deserialize)]
struct MatrixSeries {
    #[serde(default)]
    values: Vec<(f64, String)>,
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

async fn prometheus_get<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    query: &[(&str, String)],
) -> std::result::Result<T, String> {
    let mut request = client.get(url).query(query);
    for (name, value) in headers {
        request = request.header(name, value);
    }
    let response = request.send().await.map_err(|e| e.to_string())?;
    let status = response.status();
    let body: PromResponse<T> = response.json().await.map_err(|e| format!("{status}: {e}"))?;
    if body.status != "success" {
        return Err(if body.error.is_empty() { status.to_string() } else { body.error });
    }
    body.data.ok_or_else(|| "empty response".to_string())
}

/// Hourly `ALERTS_FOR_STATE` changes for the alert with `labels`.
async fn count_alerts(
    client: &reqwest::Client,
    uri: &str,
    headers: &BTreeMap<String, String>,
    labels: &Labels,
) -> QueryResult {
    if uri.is_empty() {
        return Ok(Vec::new());
    }
    let now = Utc::now();

    let known: Vec<String> = prometheus_get(
        client,
        &format!("{uri}/api/v1/labels"),
        headers,
        &[
            ("match[]", "{__name__=\"ALERTS_FOR_STATE\"}".to_string()),
            ("start", (now - Duration::minutes(5)).timestamp().to_string()),
            ("end", now.timestamp().to_string()),
        ],
    )
    .await?;

    let selector: Vec<String> = labels
        .iter()
        .filter(|(name, _)| known.contains(name))
        .map(|(name, value)| format!("{name}=\"{}\"", escape_label_value(value)))
        .collect();
    let query = format!("changes(ALERTS_FOR_STATE{{{}}}[1h])", selector.join(","));
    debug!(uri = %uri, query = %query, "Querying alert history");

    let data: MatrixData = prometheus_get(
        client,
        &format!("{uri}/api/v1/query_range"),
        headers,
        &[
            ("query", query),
            ("start", (now - Duration::hours(23)).timestamp().to_string()),
            ("end", now.timestamp().to_string()),
            ("step", "3600".to_string()),
        ],
    )
    .await?;

    let mut samples = Vec::new();
    for series in data.result {
        for (ts, value) in series.values {
            let millis = (ts * 1000.0) as i64;
            let Some(timestamp) = Utc.timestamp_millis_opt(millis).single() else {
                continue;
            };
            let value = value.parse::<f64>().map_err(|e| format!("invalid sample value {value:?}: {e}"))?;
            samples.push(OffsetSample {
                timestamp,
                value: value as i64,
            });
        }
    }
    Ok(samples)
}

struct Caches {
    results: Mutex<LruCache<String, (Instant, Vec<OffsetSample>)>>,
    known_bad: Mutex<LruCache<String, (Instant, String)>>,
}

async fn run_worker(id: usize, client: reqwest::Client, jobs: Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>, caches: Arc<Caches>) {
    loop {
        let job = {
            let mut jobs = jobs.lock().await;
            jobs.recv().await
        };
        let Some(job) = job else {
            debug!(worker = id, "History worker stopped");
            return;
        };

        let Target { uri, headers, client: rule_client } = job.target;
        let key = cache_key(&uri, &job.labels);
        let cached_error = caches
            .known_bad
            .lock()
            .get(&key)
            .filter(|(at, _)| at.elapsed() < CACHE_TTL)
            .map(|(_, err)| err.clone());
        if let Some(err) = cached_error {
            let _ = job.reply.send(Err(err));
            continue;
        }
        let cached = caches
            .results
            .lock()
            .get(&key)
            .filter(|(at, _)| at.elapsed() < CACHE_TTL)
            .map(|(_, samples)| samples.clone());
        if let Some(samples) = cached {
            let _ = job.reply.send(Ok(samples));
            continue;
        }

        let result = count_alerts(rule_client.as_ref().unwrap_or(&client), &uri, &headers, &job.labels).await;
        match &result {
            Ok(samples) => {
                caches.results.lock().put(key, (Instant::now(), samples.clone()));
            }
            Err(err) => {
                warn!(uri = %uri, error = %err, "History query failed");
                caches.known_bad.lock().put(key, (Instant::now(), err.clone()));
            }
        }
        let _ = job.reply.send(result);
    }
}

/// Worker pool serving history queries.
#[derive(Clone)]
pub struct HistoryPoller {
    jobs: mpsc::Sender<Job>,
    rules: Arc<Vec<RewriteRule>>,
}

impl std::fmt::Debug for HistoryPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryPoller").field("rules", &self.rules.len()).finish_non_exhaustive()
    }
}

impl HistoryPoller {
    /// Spawns `config.workers` workers on the current runtime.
    pub fn start(config: &HistorySection) -> Result<Self> {
        let rules = RewriteRule::from_config(&config.rewrite, config.timeout)?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::Config {
                reason: format!("failed to build history client: {e}"),
            })?;
        let (tx, rx) = mpsc::channel(QUEUE_SIZE);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let caches = Arc::new(Caches {
            results: Mutex::new(LruCache::new(RESULTS_CAPACITY)),
            known_bad: Mutex::new(LruCache::new(KNOWN_BAD_CAPACITY)),
        });
        for id in 0..config.workers.max(1) {
            tokio::spawn(run_worker(id, client.clone(), Arc::clone(&rx), Arc::clone(&caches)));
        }
        debug!(workers = config.workers, "Started history workers");
        Ok(Self {
            jobs: tx,
            rules: Arc::new(rules),
        })
    }

    async fn query(&self, target: Target, labels: Labels) -> QueryResult {
        let (reply, rx) = oneshot::channel();
        self.jobs
            .send(Job { target, labels, reply })
            .await
            .map_err(|_| "history workers are not running".to_string())?;
        rx.await.map_err(|_| "history worker dropped the query".to_string())?
    }

    /// Queries every distinct source and sums the results into hourly
    /// buckets. Sources rewritten to the same Prometheus count once each.
    pub async fn history(&self, sources: &[String], labels: &Labels) -> HistoryResponse {
        let mut targets: Vec<(String, Target)> = Vec::new();
        for source in sources {
            if targets.iter().any(|(s, _)| s == source) {
                continue;
            }
            if let Some(target) = rewrite_source(&self.rules, source) {
                targets.push((source.clone(), target));
            }
        }

        let queries = targets
            .into_iter()
            .map(|(source, target)| async move { (source, self.query(target, labels.clone()).await) });
        let results = futures::future::join_all(queries).await;

        let now = Utc::now();
        let mut buckets = empty_buckets(now);
        let mut errors = Vec::new();
        for (source, result) in results {
            match result {
                Ok(samples) => add_samples(&mut buckets, &samples),
                Err(err) => errors.push(format!("{source}: {err}")),
            }
        }

        HistoryResponse {
            error: if errors.is_empty() {
                String::new()
            } else {
                format!("One or more errors occurred when querying Prometheus API: {}", errors.join(", "))
            },
            samples: buckets,
        }
    }
}

/// Hourly buckets, newest first, starting at `now`.
fn empty_buckets(now: DateTime<Utc>) -> Vec<OffsetSample> {
    (0..BUCKETS)
        .map(|i| OffsetSample {
            timestamp: now - Duration::hours(i),
            value: 0,
        })
        .collect()
}

/// Adds each sample to the first bucket less than half an hour away.
fn add_samples(buckets: &mut [OffsetSample], samples: &[OffsetSample]) {
    for sample in samples {
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| (b.timestamp - sample.timestamp).num_seconds().abs() < 30 * 60)
        {
            bucket.value += sample.value;
        }
    }
}
