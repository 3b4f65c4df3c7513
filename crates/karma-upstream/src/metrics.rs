//! Prometheus exporter for upstream collection stats.
//!
//! Values are not updated as pulls happen. [`UpstreamMetrics::encode`] reads
//! every upstream through the registry and refreshes the families right
//! before encoding.
//!
//! # Example
//!
//! ```rust
//! use karma_upstream::{Transforms, UpstreamConfig, UpstreamMetrics, UpstreamRegistry};
//!
//! let registry = UpstreamRegistry::new(
//!     vec![UpstreamConfig::new("am1", "http://localhost:9093")],
//!     Transforms::default(),
//! )
//! .unwrap();
//! let metrics = UpstreamMetrics::new();
//! let output = metrics.encode(&registry);
//! assert!(output.contains("karma_collect_cycles_total{alertmanager=\"am1\"} 0"));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use karma_models::AlertState;
use parking_lot::RwLock;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::registry::UpstreamRegistry;

/// Labels of the per-upstream alert gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct AlertLabels {
    /// Upstream name.
    pub alertmanager: String,
    /// Alert state.
    pub state: String,
    /// Receiver name.
    pub receiver: String,
}

/// Labels of the per-upstream group gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct GroupLabels {
    /// Upstream name.
    pub alertmanager: String,
    /// Receiver name.
    pub receiver: String,
}

/// Labels carrying just the upstream name.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct UpstreamLabels {
    /// Upstream name.
    pub alertmanager: String,
}

/// Labels of the error counter.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Upstream name.
    pub alertmanager: String,
    /// Failed endpoint: `status`, `alerts` or `silences`.
    pub endpoint: String,
}

/// Collection metrics for every upstream.
#[derive(Clone)]
pub struct UpstreamMetrics {
    registry: Arc<RwLock<Registry>>,
    collected_alerts: Family<AlertLabels, Gauge>,
    collected_groups: Family<GroupLabels, Gauge>,
    cycles: Family<UpstreamLabels, Counter>,
    errors: Family<ErrorLabels, Counter>,
    up: Family<UpstreamLabels, Gauge>,
}

impl std::fmt::Debug for UpstreamMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamMetrics").finish_non_exhaustive()
    }
}

impl Default for UpstreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl UpstreamMetrics {
    /// Creates and registers every metric.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let collected_alerts = Family::<AlertLabels, Gauge>::default();
        registry.register(
            "karma_collected_alerts_count",
            "Total number of alerts collected from Alertmanager API",
            collected_alerts.clone(),
        );

        let collected_groups = Family::<GroupLabels, Gauge>::default();
        registry.register(
            "karma_collected_groups_count",
            "Total number of alert groups collected from Alertmanager API",
            collected_groups.clone(),
        );

        // The text encoder appends `_total` to counter names.
        let cycles = Family::<UpstreamLabels, Counter>::default();
        registry.register(
            "karma_collect_cycles",
            "Total number of alert collection cycles run",
            cycles.clone(),
        );

        let errors = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "karma_alertmanager_errors",
            "Total number of errors encounter when requesting data from Alertmanager API",
            errors.clone(),
        );

        let up = Family::<UpstreamLabels, Gauge>::default();
        registry.register(
            "karma_alertmanager_up",
            "1 if last call to Alertmanager API succeeded",
            up.clone(),
        );

        Self {
            registry: Arc::new(RwLock::new(registry)),
            collected_alerts,
            collected_groups,
            cycles,
            errors,
            up,
        }
    }

    /// Refreshes every family from the current upstream snapshots.
    pub fn collect(&self, upstreams: &UpstreamRegistry) {
        self.collected_alerts.clear();
        self.collected_groups.clear();

        for upstream in upstreams.upstreams() {
            let name = upstream.name().to_string();
            let labels = UpstreamLabels {
                alertmanager: name.clone(),
            };

            set_counter(&self.cycles.get_or_create(&labels), upstream.cycles());
            for (endpoint, count) in upstream.errors() {
                let labels = ErrorLabels {
                    alertmanager: name.clone(),
                    endpoint: endpoint.to_string(),
                };
                set_counter(&self.errors.get_or_create(&labels), count);
            }
            self.up
                .get_or_create(&labels)
                .set(i64::from(upstream.error().is_empty()));

            let mut groups: BTreeMap<String, i64> = BTreeMap::new();
            let mut alerts: BTreeMap<String, BTreeMap<AlertState, i64>> = BTreeMap::new();
            for group in upstream.alerts() {
                *groups.entry(group.receiver.clone()).or_default() += 1;
                for alert in &group.alerts {
                    let by_state = alerts.entry(alert.receiver.clone()).or_insert_with(|| {
                        [AlertState::Unprocessed, AlertState::Active, AlertState::Suppressed]
                            .into_iter()
                            .map(|s| (s, 0))
                            .collect()
                    });
                    *by_state.entry(alert.state()).or_default() += 1;
                }
            }

            for (receiver, count) in groups {
                self.collected_groups
                    .get_or_create(&GroupLabels {
                        alertmanager: name.clone(),
                        receiver,
                    })
                    .set(count);
            }
            for (receiver, by_state) in alerts {
                for (state, count) in by_state {
                    self.collected_alerts
                        .get_or_create(&AlertLabels {
                            alertmanager: name.clone(),
                            state: state.as_str().to_string(),
                            receiver: receiver.clone(),
                        })
                        .set(count);
                }
            }
        }
    }

    /// Collects and encodes everything in the text exposition format.
    pub fn encode(&self, upstreams: &UpstreamRegistry) -> String {
        self.collect(upstreams);
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            tracing::error!("failed to encode prometheus metrics");
            return String::new();
        }
        buffer
    }

    /// Content type of [`encode`](Self::encode) output.
    pub const fn content_type() -> &'static str {
        "text/plain; version=0.0.4; charset=utf-8"
    }
}

/// Moves a monotonic counter up to `total`.
fn set_counter(counter: &Counter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transforms;
    use crate::upstream::UpstreamConfig;

    fn registry() -> UpstreamRegistry {
        UpstreamRegistry::new(
            vec![
                UpstreamConfig::new("am1", "http://localhost:9093"),
                UpstreamConfig::new("am2", "http://localhost:9094"),
            ],
            Transforms::default(),
        )
        .unwrap()
    }

    #[test]
    fn encodes_every_upstream() {
        let metrics = UpstreamMetrics::new();
        let output = metrics.encode(&registry());
        assert!(output.contains("karma_collect_cycles_total{alertmanager=\"am2\"} 0"));
        assert!(output.contains("karma_alertmanager_up{alertmanager=\"am1\"} 1"));
        assert!(!output.contains("karma_collected_alerts_count{"));
    }

    #[test]
    fn counters_follow_totals() {
        let counter = Counter::default();
        set_counter(&counter, 3);
        set_counter(&counter, 3);
        set_counter(&counter, 5);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn content_type() {
        assert_eq!(UpstreamMetrics::content_type(), "text/plain; version=0.0.4; charset=utf-8");
    }
}
