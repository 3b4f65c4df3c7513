//! Shared state for the karma server.

use karma_upstream::{UpstreamMetrics, UpstreamRegistry};
use tracing::info;

use crate::acl::SilenceAcl;
use crate::auth::Authenticator;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::error::Result;
use crate::history::HistoryPoller;

/// Everything handlers need, shared behind an `Arc`.
#[derive(Debug)]
pub struct AppState {
    /// Validated configuration.
    pub config: Config,
    /// Upstream clients and their snapshots.
    pub registry: UpstreamRegistry,
    /// Serialized responses, purged after every pull.
    pub cache: ResponseCache,
    /// Prometheus exporter.
    pub metrics: UpstreamMetrics,
    /// History workers, `None` when history is disabled.
    pub history: Option<HistoryPoller>,
    /// Silence ACL rules.
    pub acl: SilenceAcl,
    /// Request authentication.
    pub auth: Authenticator,
}

impl AppState {
    /// Builds the state from a validated config.
    ///
    /// Must run inside a tokio runtime, history workers are spawned here.
    pub fn new(config: Config) -> Result<Self> {
        let registry = UpstreamRegistry::new(config.upstream_configs(), config.transforms()?)?;
        let history = if config.history.enabled {
            Some(HistoryPoller::start(&config.history)?)
        } else {
            None
        };
        let acl = SilenceAcl::from_config(&config)?;
        let auth = Authenticator::from_config(&config)?;
        info!(
            upstreams = registry.upstreams().len(),
            history = history.is_some(),
            authentication = auth.is_enabled(),
            "Initialised server state"
        );
        Ok(Self {
            config,
            registry,
            cache: ResponseCache::new(),
            metrics: UpstreamMetrics::new(),
            history,
            acl,
            auth,
        })
    }

    /// Pulls every upstream and drops cached responses.
    ///
    /// Returns the number of upstreams that failed.
    pub async fn pull(&self) -> usize {
        let failed = self.registry.pull_all().await;
        self.cache.purge();
        failed
    }
}
