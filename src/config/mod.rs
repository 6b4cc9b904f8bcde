mod file_config;

pub use file_config::FileConfig;

use crate::server::RequestsLoggingLevel;
use crate::sessions::SessionPolicy;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub keys_file: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub key_secret: Option<String>,
    pub heartbeat_timeout_secs: u64,
    pub idle_retention_secs: u64,
    pub sweep_interval_secs: u64,
    pub rate_limit_general_per_hour: u32,
    pub rate_limit_sensitive_per_hour: u32,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            keys_file: None,
            port: 3001,
            logging_level: RequestsLoggingLevel::default(),
            key_secret: None,
            heartbeat_timeout_secs: 30,
            idle_retention_secs: 1800,
            sweep_interval_secs: 5,
            rate_limit_general_per_hour: 100,
            rate_limit_sensitive_per_hour: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub keys_file: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    /// Secret for recoverable key storage. Without it, keys.reveal is off.
    pub key_secret: Option<String>,

    pub heartbeat_timeout_secs: u64,
    pub idle_retention_secs: u64,
    pub sweep_interval_secs: u64,

    pub rate_limit_general_per_hour: u32,
    pub rate_limit_sensitive_per_hour: u32,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let keys_file = file
            .keys_file
            .map(PathBuf::from)
            .or_else(|| cli.keys_file.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("keys_file must be specified on the command line or in config file")
            })?;

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let key_secret = file.key_secret.or_else(|| cli.key_secret.clone());

        let heartbeat_timeout_secs = file
            .heartbeat_timeout_secs
            .unwrap_or(cli.heartbeat_timeout_secs);
        let idle_retention_secs = file.idle_retention_secs.unwrap_or(cli.idle_retention_secs);
        let sweep_interval_secs = file.sweep_interval_secs.unwrap_or(cli.sweep_interval_secs);

        if heartbeat_timeout_secs == 0 {
            bail!("heartbeat_timeout_secs must be greater than zero");
        }
        if sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be greater than zero");
        }
        if heartbeat_timeout_secs >= idle_retention_secs {
            bail!(
                "heartbeat_timeout_secs ({}) must be smaller than idle_retention_secs ({})",
                heartbeat_timeout_secs,
                idle_retention_secs
            );
        }

        let rate_limit_general_per_hour = file
            .rate_limit_general_per_hour
            .unwrap_or(cli.rate_limit_general_per_hour);
        let rate_limit_sensitive_per_hour = file
            .rate_limit_sensitive_per_hour
            .unwrap_or(cli.rate_limit_sensitive_per_hour);

        Ok(Self {
            keys_file,
            port,
            logging_level,
            key_secret,
            heartbeat_timeout_secs,
            idle_retention_secs,
            sweep_interval_secs,
            rate_limit_general_per_hour,
            rate_limit_sensitive_per_hour,
        })
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            heartbeat_timeout: Duration::from_secs(self.heartbeat_timeout_secs),
            idle_retention: Duration::from_secs(self.idle_retention_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
