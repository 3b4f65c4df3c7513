//! # karma-server
//!
//! HTTP server for the karma Alertmanager dashboard.
//!
//! The server pulls every configured Alertmanager on a fixed interval, merges
//! what they report and serves the result to the UI. It also proxies silence
//! changes to upstreams that browsers cannot reach and charts alert history
//! from Prometheus.
//!
//! ## Example
//!
//! ```rust,no_run
//! use karma_server::{Config, KarmaServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_yaml(
//!         "alertmanager:\n  servers:\n    - name: default\n      uri: http://localhost:9093\n",
//!     )?;
//!     config.validate()?;
//!
//!     let server = KarmaServer::new(config)?;
//!     let cancel = CancellationToken::new();
//!     server.spawn_poller(cancel.clone());
//!     server.serve_with_shutdown(cancel).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/alerts.json` | POST | Filtered, grouped and sorted alerts |
//! | `/autocomplete.json` | GET | Filter suggestions |
//! | `/labelNames.json` | GET | Known label names |
//! | `/labelValues.json` | GET | Known values of one label |
//! | `/silences.json` | GET | Silences with affected alert counts |
//! | `/history.json` | POST | Hourly alert state changes from Prometheus |
//! | `/counters.json` | GET | Label statistics |
//! | `/alertList.json` | GET | Flat list of alert label sets |
//! | `/proxy/alertmanager/{name}/api/v2/...` | POST, DELETE | Silence proxy |
//! | `/metrics` | GET | Prometheus metrics |
//! | `/health` | GET | Liveness |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod acl;
pub mod aggregate;
pub mod auth;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;

pub use config::Config;
pub use error::{Result, ServerError};
pub use server::KarmaServer;
