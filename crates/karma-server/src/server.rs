//! Server lifecycle: the pull loop and the HTTP listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::routes::create_router;
use crate::state::AppState;

/// How long in-flight TLS connections get to finish on shutdown.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// The karma server.
#[derive(Debug, Clone)]
pub struct KarmaServer {
    state: Arc<AppState>,
}

impl KarmaServer {
    /// Create a server from a validated config.
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            state: Arc::new(AppState::new(config)?),
        })
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Create the router without starting the server.
    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Pulls every upstream once per `alertmanager.interval` until `cancel`
    /// fires. The first pull starts immediately. A pull that overruns the
    /// interval makes the next tick skip.
    pub fn spawn_poller(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let state = self.state();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(state.config.alertmanager.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let failed = state.pull().await;
                        debug!(failed, "Pull cycle finished");
                    }
                }
            }
            info!("Alertmanager poller stopped");
        })
    }

    /// Serve HTTP, or HTTPS when `listen.tls` is set, until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address or loading TLS files fails.
    pub async fn serve_with_shutdown(&self, cancel: CancellationToken) -> Result<()> {
        let addr = self.state.config.listen.socket_addr()?;
        let tls = &self.state.config.listen.tls;
        match (&tls.cert, &tls.key) {
            (Some(cert), Some(key)) => {
                let tls_config = RustlsConfig::from_pem_file(cert, key)
                    .await
                    .map_err(|e| ServerError::Config {
                        reason: format!("failed to load listen.tls files: {e}"),
                    })?;
                self.serve_tls(addr, tls_config, cancel).await
            }
            _ => self.serve_plain(addr, cancel).await,
        }
    }

    async fn serve_plain(&self, addr: SocketAddr, cancel: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed { addr, source: e })?;

        info!(addr = %addr, prefix = %self.state.config.listen.prefix, "karma listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        info!("karma shut down");
        Ok(())
    }

    async fn serve_tls(&self, addr: SocketAddr, tls: RustlsConfig, cancel: CancellationToken) -> Result<()> {
        let handle = axum_server::Handle::new();
        let shutdown = handle.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            shutdown.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
        });

        info!(addr = %addr, prefix = %self.state.config.listen.prefix, "karma listening with TLS");

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router().into_make_service())
            .await
            .map_err(|e| ServerError::BindFailed { addr, source: e })?;

        info!("karma shut down");
        Ok(())
    }
}
