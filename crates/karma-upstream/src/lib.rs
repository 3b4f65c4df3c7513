//! # karma-upstream
//!
//! Alertmanager clients and the registry that merges what they collect.
//!
//! - [`Upstream`] pulls one Alertmanager. It detects the remote version,
//!   decodes silences and alert groups with the matching [`mapper`], applies
//!   [`Transforms`] and swaps in a new [`Snapshot`].
//! - [`UpstreamRegistry`] holds every upstream, pulls them concurrently and
//!   deduplicates alerts, silences, colors and hints across them.
//! - [`UpstreamMetrics`] exports collection stats for Prometheus.
//!
//! ## Example
//!
//! ```rust,no_run
//! use karma_upstream::{Transforms, UpstreamConfig, UpstreamRegistry};
//!
//! # async fn run() -> karma_upstream::Result<()> {
//! let registry = UpstreamRegistry::new(
//!     vec![UpstreamConfig::new("default", "http://localhost:9093")],
//!     Transforms::default(),
//! )?;
//! registry.pull_all().await;
//! for group in registry.dedup_alerts() {
//!     println!("{} {}", group.receiver, group.alerts.len());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod mapper;
pub mod metrics;
pub mod registry;
pub mod transform;
pub mod upstream;
pub mod uri;

pub use error::{Result, UpstreamError};
pub use mapper::{Mapper, RemoteStatus};
pub use metrics::UpstreamMetrics;
pub use registry::{SilencesByCluster, UpstreamRegistry};
pub use transform::{ColorRule, ColorRules, KeepStrip, LinkDetectRule, Transforms};
pub use upstream::{tls_client_builder, Snapshot, TlsConfig, Upstream, UpstreamConfig, DEFAULT_TIMEOUT};
pub use uri::{sanitize_uri, BasicAuth};
