//! karma - alert dashboard for Prometheus Alertmanager.

use anyhow::Context;
use clap::Parser;
use karma_server::cli::Cli;
use karma_server::{Config, KarmaServer};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match (config.log.format.as_str(), config.log.timestamp) {
        ("json", true) => builder.json().init(),
        ("json", false) => builder.json().without_time().init(),
        (_, true) => builder.init(),
        (_, false) => builder.without_time().init(),
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("Shutdown signal received");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (path, required) = cli.config_path();

    let mut config = Config::load(&path, required).context("failed to load configuration")?;
    config.apply_overrides(&cli.overrides());
    init_tracing(&config);

    config.validate().context("invalid configuration")?;
    if config.log.config {
        let masked = serde_yaml::to_string(&config.masked()).context("failed to render configuration")?;
        info!(config = %masked, "Effective configuration");
    }
    if cli.check_config {
        info!(path = %path.display(), "Configuration is valid");
        return Ok(());
    }

    info!(
        version = karma_server::aggregate::VERSION,
        upstreams = config.alertmanager.servers.len(),
        interval = %humantime::format_duration(config.alertmanager.interval),
        "Starting karma"
    );

    let server = KarmaServer::new(config)?;
    let cancel = CancellationToken::new();
    let poller = server.spawn_poller(cancel.clone());
    tokio::spawn(shutdown_signal(cancel.clone()));

    let result = server.serve_with_shutdown(cancel.clone()).await;
    cancel.cancel();
    poller.await.context("poller task failed")?;
    result?;
    Ok(())
}
