mod file_config;

pub use file_config::{FileConfig, RetryConfig};

use anyhow::{bail, Result};
use std::time::Duration;

use crate::badge::DEFAULT_THROTTLE_WINDOW;
use crate::feed::RetryPolicy;
use crate::lifecycle::DEFAULT_POLL_INTERVAL;
use crate::misuse::MisusePolicy;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Settings for the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    /// Base URL the notification routes are appended to, without trailing slash.
    pub base_url: String,
    pub request_timeout_secs: u64,
    /// Sent as a bearer token when present.
    pub auth_token: Option<String>,
}

/// Settings consumed by the sync core.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Minimum time between two unforced badge fetches.
    pub badge_throttle: Duration,
    /// Foreground badge polling interval.
    pub poll_interval: Duration,
    /// Retry policy for page fetches.
    pub retry: RetryPolicy,
    pub misuse_policy: MisusePolicy,
    /// Buffer size of the event channel.
    pub event_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            badge_throttle: DEFAULT_THROTTLE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
            misuse_policy: MisusePolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub badge_throttle_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            badge_throttle_secs: DEFAULT_THROTTLE_WINDOW.as_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http: HttpSettings,
    pub sync: SyncSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let base_url = file
            .base_url
            .or_else(|| cli.base_url.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("base_url must be specified via --base-url or in config file")
            })?;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            bail!("base_url must be an http(s) URL: {}", base_url);
        }

        let request_timeout_secs = file
            .request_timeout_secs
            .unwrap_or(cli.request_timeout_secs);
        if request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }

        let http = HttpSettings {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout_secs,
            auth_token: file.auth_token.or_else(|| cli.auth_token.clone()),
        };

        let poll_interval_secs = file.poll_interval_secs.unwrap_or(cli.poll_interval_secs);
        if poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        let badge_throttle_secs = file.badge_throttle_secs.unwrap_or(cli.badge_throttle_secs);

        let misuse_policy = match file.misuse_policy.as_deref() {
            None => MisusePolicy::default(),
            Some(s) => match parse_misuse_policy(s) {
                Some(policy) => policy,
                None => bail!("Unknown misuse_policy: {} (expected panic or ignore)", s),
            },
        };

        let retry = resolve_retry(file.retry.unwrap_or_default())?;

        let sync = SyncSettings {
            badge_throttle: Duration::from_secs(badge_throttle_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            retry,
            misuse_policy,
            event_capacity: file.event_capacity.unwrap_or(DEFAULT_EVENT_CAPACITY).max(1),
        };

        Ok(Self { http, sync })
    }
}

fn resolve_retry(file: RetryConfig) -> Result<RetryPolicy> {
    let defaults = RetryPolicy::default();
    let retry = RetryPolicy {
        max_attempts: file.max_attempts.unwrap_or(defaults.max_attempts),
        initial_backoff: file
            .initial_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.initial_backoff),
        max_backoff: file
            .max_backoff_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_backoff),
        backoff_multiplier: file
            .backoff_multiplier
            .unwrap_or(defaults.backoff_multiplier),
        max_jitter: file
            .max_jitter_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.max_jitter),
    };

    if retry.max_attempts == 0 {
        bail!("retry.max_attempts must be at least 1");
    }
    if retry.backoff_multiplier < 1.0 {
        bail!(
            "retry.backoff_multiplier must be at least 1.0, got {}",
            retry.backoff_multiplier
        );
    }
    if retry.max_backoff < retry.initial_backoff {
        bail!("retry.max_backoff_ms must not be lower than retry.initial_backoff_ms");
    }
    Ok(retry)
}

fn parse_misuse_policy(s: &str) -> Option<MisusePolicy> {
    match s.to_lowercase().as_str() {
        "panic" => Some(MisusePolicy::Panic),
        "ignore" => Some(MisusePolicy::Ignore),
        _ => None,
    }
}
