//! Command line flags.
//!
//! Every flag but `--check-config` can also come from the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::ConfigOverrides;

/// Config file read when `--config.file` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "karma.yaml";

/// karma command line.
#[derive(Debug, Parser)]
#[command(name = "karma")]
#[command(about = "Alert dashboard for Prometheus Alertmanager")]
#[command(version)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(long = "config.file", env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Validate the config and exit
    #[arg(long = "check-config")]
    pub check_config: bool,

    /// Alertmanager URI, used when no servers are configured
    #[arg(long = "alertmanager.uri", env = "ALERTMANAGER_URI")]
    pub alertmanager_uri: Option<String>,

    /// How often to pull Alertmanager, e.g. 30s
    #[arg(long = "alertmanager.interval", env = "ALERTMANAGER_INTERVAL", value_parser = humantime::parse_duration)]
    pub alertmanager_interval: Option<Duration>,

    /// Address to listen on
    #[arg(long = "listen.address", env = "LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Port to listen on
    #[arg(long = "listen.port", env = "LISTEN_PORT")]
    pub listen_port: Option<u16>,

    /// URL prefix
    #[arg(long = "listen.prefix", env = "LISTEN_PREFIX")]
    pub listen_prefix: Option<String>,

    /// Log level
    #[arg(long = "log.level", env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format, text or json
    #[arg(long = "log.format", env = "LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Enable alert history queries
    #[arg(long = "history.enabled", env = "HISTORY_ENABLED")]
    pub history_enabled: Option<bool>,
}

impl Cli {
    /// Config file to read and whether it must exist.
    ///
    /// Only an explicitly named file is required.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config_file {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }

    /// Values overriding the config file.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            alertmanager_uri: self.alertmanager_uri.clone(),
            alertmanager_interval: self.alertmanager_interval,
            listen_address: self.listen_address.clone(),
            listen_port: self.listen_port,
            listen_prefix: self.listen_prefix.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            history_enabled: self.history_enabled,
        }
    }
}
