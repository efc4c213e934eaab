use crate::error::{GatekeeperError, Result};
use crate::identity::IdentityConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Main gatekeeper configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatekeeperConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,
    /// Base quota limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Per-tool quota multipliers and cost weights
    #[serde(default)]
    pub tools: HashMap<String, ToolConfig>,
    /// Violation tracking and automatic blocking
    #[serde(default)]
    pub violations: ViolationConfig,
    /// Client identity resolution
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Behavior when the counter store cannot be reached
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Prometheus metrics
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Which store backend to use
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis connection URL (required for the redis backend)
    #[serde(default)]
    pub url: Option<String>,
    /// Prefix for every key written by the gatekeeper
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// How often the memory backend drops expired keys
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

/// Base quota limits, before per-tool multipliers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_per_minute")]
    pub per_minute: u64,
    #[serde(default = "default_per_hour")]
    pub per_hour: u64,
    /// Extra requests allowed on top of the minute limit
    #[serde(default = "default_burst")]
    pub burst: u64,
    /// Total cost allowed per client per minute
    #[serde(default = "default_cost_budget")]
    pub cost_budget: u64,
    /// Cost of a tool that has no configured weight
    #[serde(default = "default_cost")]
    pub default_cost: u64,
}

/// Per-tool overrides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolConfig {
    /// Scales the base count limits for this tool
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Cost weight charged against the minute cost budget
    #[serde(default)]
    pub cost: Option<u64>,
}

/// Violation tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViolationConfig {
    /// Violations before a client is blocked automatically
    #[serde(default = "default_violation_threshold")]
    pub threshold: u64,
    /// How long a violation is remembered
    #[serde(default = "default_violation_ttl")]
    pub ttl_secs: u64,
    /// Duration of an automatic block
    #[serde(default = "default_block_duration")]
    pub block_duration_secs: u64,
}

/// What to do when the counter store is unreachable
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Admit the request and log the failure
    #[default]
    Open,
    /// Deny the request
    Closed,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_namespace() -> String {
    "gatekeeper".to_string()
}

fn default_purge_interval() -> u64 {
    60
}

fn default_per_minute() -> u64 {
    15
}

fn default_per_hour() -> u64 {
    90
}

fn default_burst() -> u64 {
    5
}

fn default_cost_budget() -> u64 {
    50
}

fn default_cost() -> u64 {
    1
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_violation_threshold() -> u64 {
    10
}

fn default_violation_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_block_duration() -> u64 {
    3_600 // 1 hour
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: None,
            namespace: default_namespace(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
            burst: default_burst(),
            cost_budget: default_cost_budget(),
            default_cost: default_cost(),
        }
    }
}

impl Default for ViolationConfig {
    fn default() -> Self {
        Self {
            threshold: default_violation_threshold(),
            ttl_secs: default_violation_ttl(),
            block_duration_secs: default_block_duration(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

impl GatekeeperConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GatekeeperError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| GatekeeperError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.namespace.is_empty() {
            return Err(GatekeeperError::Config(
                "Store namespace cannot be empty".to_string(),
            ));
        }

        if self.store.purge_interval_secs == 0 {
            return Err(GatekeeperError::Config(
                "Store purge interval must be > 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Redis
            && self.store.url.as_deref().map_or(true, str::is_empty)
        {
            return Err(GatekeeperError::Config(
                "Redis store requires a url".to_string(),
            ));
        }

        let limits = &self.limits;
        if limits.per_minute == 0 || limits.per_hour == 0 {
            return Err(GatekeeperError::Config(
                "Quota limits must be > 0".to_string(),
            ));
        }
        if limits.cost_budget == 0 {
            return Err(GatekeeperError::Config(
                "Cost budget must be > 0".to_string(),
            ));
        }
        if limits.default_cost == 0 {
            return Err(GatekeeperError::Config(
                "Default cost must be > 0".to_string(),
            ));
        }

        for (name, tool) in &self.tools {
            if !tool.multiplier.is_finite() || tool.multiplier <= 0.0 {
                return Err(GatekeeperError::Config(format!(
                    "Multiplier must be a positive number for tool: {}",
                    name
                )));
            }
            if tool.cost == Some(0) {
                return Err(GatekeeperError::Config(format!(
                    "Cost must be > 0 for tool: {}",
                    name
                )));
            }
        }

        if self.violations.threshold == 0 {
            return Err(GatekeeperError::Config(
                "Violation threshold must be > 0".to_string(),
            ));
        }
        if self.violations.ttl_secs == 0 || self.violations.block_duration_secs == 0 {
            return Err(GatekeeperError::Config(
                "Violation TTL and block duration must be > 0".to_string(),
            ));
        }

        if self.identity.trusted_headers.is_empty() {
            return Err(GatekeeperError::Config(
                "At least one trusted identity header is required".to_string(),
            ));
        }

        Ok(())
    }
}
