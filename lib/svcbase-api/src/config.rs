//! Process configuration
//!
//! Config files are YAML with kebab-case keys. Every section is optional;
//! missing sections fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level process configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BaseConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub circuit_breaker: BreakerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl BaseConfig {
    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }
}

/// Discovery backend settings; the endpoint is the registry base URL and is
/// otherwise opaque to this layer
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Registry base URL, e.g. "http://registry:4000"
    #[serde(default)]
    pub endpoint: String,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

impl DiscoveryConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

fn default_connect_timeout() -> u64 {
    5_000
}

fn default_request_timeout() -> u64 {
    10_000
}

/// Circuit breaker parameters (`circuit-breaker` section).
///
/// `fallback-on-failure` is not a config key; it is fixed to true for every
/// breaker this layer constructs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_name")]
    pub name: String,
    /// Consecutive failures before the breaker opens (minimum 1)
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Call timeout in milliseconds
    #[serde(default = "default_breaker_timeout")]
    pub timeout: u64,
    /// Time in milliseconds the breaker stays open before probing
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout: u64,
}

impl BreakerConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            name: default_breaker_name(),
            max_failures: default_max_failures(),
            timeout: default_breaker_timeout(),
            reset_timeout: default_reset_timeout(),
        }
    }
}

fn default_breaker_name() -> String {
    "circuit-breaker".to_string()
}

fn default_max_failures() -> u32 {
    5
}

fn default_breaker_timeout() -> u64 {
    10_000
}

fn default_reset_timeout() -> u64 {
    30_000
}

/// API identity (`api` section)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// API name attached to HTTP endpoint records; empty by default
    #[serde(default)]
    pub name: String,
}

/// Heartbeat endpoint settings (`heartbeat` section)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_path")]
    pub path: String,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            path: default_heartbeat_path(),
        }
    }
}

fn default_heartbeat_path() -> String {
    "/health".to_string()
}

/// Metrics endpoint settings (`metrics` section)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
        }
    }
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Listen settings for the owning service's HTTP surface (`http` section)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// Bearer token gating the HTTP surface; unset disables the gate
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            auth_token: None,
        }
    }
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}
