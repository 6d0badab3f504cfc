//! Configuration management for Windowgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{GateError, Result};
use crate::http::KeyExtractor;
use crate::ratelimit::{Policy, DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};

/// Prefix for environment overrides, e.g.
/// `WINDOWGATE__RATE_LIMITING__MAX_REQUESTS=20`.
const ENV_PREFIX: &str = "WINDOWGATE";

/// Main configuration for the Windowgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Maximum requests admitted per client within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Sliding window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// How long an empty window is kept before eviction, in milliseconds.
    /// Defaults to one window.
    #[serde(default)]
    pub idle_retention_ms: Option<u64>,

    /// Interval between eviction sweeps in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    /// Header holding the client address (e.g. `x-forwarded-for`).
    /// The connection's peer address is used when unset.
    #[serde(default)]
    pub key_header: Option<String>,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            idle_retention_ms: None,
            sweep_interval_ms: default_sweep_interval_ms(),
            key_header: None,
        }
    }
}

fn default_max_requests() -> usize {
    DEFAULT_MAX_REQUESTS
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW.as_millis() as u64
}

fn default_sweep_interval_ms() -> u64 {
    10_000
}

impl RateLimitingConfig {
    /// Build the admission policy described by this configuration.
    pub fn policy(&self) -> Result<Policy> {
        let policy = Policy::new(self.max_requests, Duration::from_millis(self.window_ms))?;
        Ok(match self.idle_retention_ms {
            Some(ms) => policy.with_idle_retention(Duration::from_millis(ms)),
            None => policy,
        })
    }

    /// Interval between eviction sweeps.
    pub fn sweep_interval(&self) -> Result<Duration> {
        if self.sweep_interval_ms == 0 {
            return Err(GateError::Config(
                "sweep_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(Duration::from_millis(self.sweep_interval_ms))
    }

    /// Build the key extractor for the admission middleware.
    pub fn key_extractor(&self) -> Result<KeyExtractor> {
        match &self.key_header {
            Some(header) => KeyExtractor::from_header(header),
            None => Ok(KeyExtractor::peer_ip()),
        }
    }
}

impl GateConfig {
    /// Load configuration from an optional YAML file, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| GateError::Config(e.to_string()))
    }

    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse configuration: {}", e)))
    }
}
