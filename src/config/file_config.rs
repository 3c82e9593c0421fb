use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Transport (can override CLI)
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_secs: Option<u64>,

    // Sync behaviour
    pub poll_interval_secs: Option<u64>,
    pub badge_throttle_secs: Option<u64>,
    pub event_capacity: Option<usize>,
    /// "panic" or "ignore"
    pub misuse_policy: Option<String>,

    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub max_jitter_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
