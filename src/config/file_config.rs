use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub keys_file: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub key_secret: Option<String>,

    // Session policy
    pub heartbeat_timeout_secs: Option<u64>,
    pub idle_retention_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,

    // Admin quotas
    pub rate_limit_general_per_hour: Option<u32>,
    pub rate_limit_sensitive_per_hour: Option<u32>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
