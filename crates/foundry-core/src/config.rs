//! Configuration loading and typed config structures for the Foundry core.
//!
//! The canonical configuration lives in `foundry-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror
//! the YAML structure, and provides a loader that reads, applies
//! environment overrides, and validates the file.
//!
//! Validation happens once at startup: a weight table that does not sum
//! to 1.0, a zero interval, or a window smaller than the minimum sample
//! count is rejected before any subsystem is constructed.

use std::collections::BTreeMap;
use std::path::Path;

use foundry_types::Phase;
use serde::Deserialize;

/// Tolerance for the phase-weight sum check. Weights are written by
/// humans in YAML; exact binary equality with 1.0 is not a reasonable
/// demand.
const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but violates an invariant.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Foundry configuration.
///
/// Mirrors the structure of `foundry-config.yaml`. All fields have
/// sensible defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FoundryConfig {
    /// Pipeline tracking parameters (weights, retries, TTLs).
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Event fanout parameters.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Health sampling and trend parameters.
    #[serde(default)]
    pub health: HealthConfig,

    /// Infrastructure connection strings.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl FoundryConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for infrastructure
    /// URLs: `NATS_URL` overrides `infrastructure.nats_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check every cross-field invariant.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated
    /// invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.broadcast.validate()?;
        self.health.validate()?;
        Ok(())
    }
}

/// Pipeline tracking configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Relative weight of each phase in the overall-progress formula.
    /// Must contain every phase and sum to 1.0.
    #[serde(default = "default_phase_weights")]
    pub phase_weights: BTreeMap<Phase, f64>,

    /// How many times a task may retry before it is forced to failed.
    #[serde(default = "default_max_task_retries")]
    pub max_task_retries: u32,

    /// Seconds without events before a running session is expired.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// Seconds a terminal session stays queryable before pruning.
    #[serde(default = "default_terminal_grace_secs")]
    pub terminal_grace_secs: u64,

    /// Interval of the registry prune loop, in seconds.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,

    /// Ceiling on completion estimates, in seconds past session start.
    /// Caps the runaway extrapolations near-zero progress produces.
    #[serde(default = "default_max_horizon_secs")]
    pub max_horizon_secs: u64,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for phase in Phase::ALL {
            if !self.phase_weights.contains_key(&phase) {
                return Err(ConfigError::Invalid {
                    reason: format!("phase_weights is missing phase '{phase}'"),
                });
            }
        }
        let sum: f64 = self.phase_weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(ConfigError::Invalid {
                reason: format!("phase_weights must sum to 1.0, got {sum}"),
            });
        }
        if self.phase_weights.values().any(|w| *w < 0.0) {
            return Err(ConfigError::Invalid {
                reason: "phase_weights must be non-negative".to_owned(),
            });
        }
        if self.idle_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "idle_ttl_secs must be at least 1".to_owned(),
            });
        }
        if self.prune_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "prune_interval_secs must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            phase_weights: default_phase_weights(),
            max_task_retries: default_max_task_retries(),
            idle_ttl_secs: default_idle_ttl_secs(),
            terminal_grace_secs: default_terminal_grace_secs(),
            prune_interval_secs: default_prune_interval_secs(),
            max_horizon_secs: default_max_horizon_secs(),
        }
    }
}

/// Event fanout configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Capacity of each subscriber's bounded delivery queue. On
    /// overflow the oldest event is replaced by a gap marker.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl BroadcastConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity < 2 {
            return Err(ConfigError::Invalid {
                reason: "broadcast.queue_capacity must be at least 2".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// One monitored service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceEndpointConfig {
    /// Service name used in samples, trends, and reports.
    pub name: String,
    /// Probe URL for the HTTP prober.
    pub url: String,
}

/// Health sampling and trend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthConfig {
    /// The fixed set of services to probe.
    #[serde(default = "default_services")]
    pub services: Vec<ServiceEndpointConfig>,

    /// Interval between probe cycles, in seconds.
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Per-probe timeout in milliseconds. One unresponsive service must
    /// not stall the cycle for the others.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Rolling window capacity per service (oldest sample evicted).
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Minimum samples before a trend may claim a direction.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,

    /// Relative response-time slope beyond which a trend is directional
    /// (0.10 = 10% movement between window halves).
    #[serde(default = "default_slope_threshold")]
    pub slope_threshold: f64,

    /// Latest-sample response time above which a service counts as
    /// degraded in recommendations, in milliseconds.
    #[serde(default = "default_degraded_response_time_ms")]
    pub degraded_response_time_ms: u64,

    /// Window error-rate fraction above which a recommendation fires.
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,
}

impl HealthConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                reason: "health.sample_interval_secs must be at least 1".to_owned(),
            });
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "health.probe_timeout_ms must be at least 1".to_owned(),
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid {
                reason: "health.window_size must be at least 1".to_owned(),
            });
        }
        if self.min_samples == 0 || self.min_samples > self.window_size {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "health.min_samples must be in 1..={}, got {}",
                    self.window_size, self.min_samples
                ),
            });
        }
        if self.slope_threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                reason: "health.slope_threshold must be positive".to_owned(),
            });
        }
        Ok(())
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            services: default_services(),
            sample_interval_secs: default_sample_interval_secs(),
            probe_timeout_ms: default_probe_timeout_ms(),
            window_size: default_window_size(),
            min_samples: default_min_samples(),
            slope_threshold: default_slope_threshold(),
            degraded_response_time_ms: default_degraded_response_time_ms(),
            error_rate_threshold: default_error_rate_threshold(),
        }
    }
}

/// Infrastructure connection strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS messaging URL for the engine's transport adapters.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,
}

impl InfrastructureConfig {
    /// Override infrastructure URLs with environment variables when set.
    ///
    /// This allows Docker Compose (or any deployment) to set connection
    /// strings via env vars without modifying the YAML config file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_phase_weights() -> BTreeMap<Phase, f64> {
    let mut weights = BTreeMap::new();
    weights.insert(Phase::Analysis, 0.10);
    weights.insert(Phase::Optimization, 0.15);
    weights.insert(Phase::Generation, 0.35);
    weights.insert(Phase::Quality, 0.15);
    weights.insert(Phase::Compilation, 0.15);
    weights.insert(Phase::Assessment, 0.10);
    weights
}

const fn default_max_task_retries() -> u32 {
    3
}

const fn default_idle_ttl_secs() -> u64 {
    600
}

const fn default_terminal_grace_secs() -> u64 {
    60
}

const fn default_prune_interval_secs() -> u64 {
    30
}

const fn default_max_horizon_secs() -> u64 {
    7200
}

const fn default_queue_capacity() -> usize {
    256
}

fn default_services() -> Vec<ServiceEndpointConfig> {
    vec![
        ServiceEndpointConfig {
            name: "ai-generation".to_owned(),
            url: "http://localhost:8001/health".to_owned(),
        },
        ServiceEndpointConfig {
            name: "asset-store".to_owned(),
            url: "http://localhost:8002/health".to_owned(),
        },
        ServiceEndpointConfig {
            name: "game-host".to_owned(),
            url: "http://localhost:8003/health".to_owned(),
        },
    ]
}

const fn default_sample_interval_secs() -> u64 {
    30
}

const fn default_probe_timeout_ms() -> u64 {
    5_000
}

const fn default_window_size() -> usize {
    20
}

const fn default_min_samples() -> usize {
    5
}

const fn default_slope_threshold() -> f64 {
    0.10
}

const fn default_degraded_response_time_ms() -> u64 {
    1_000
}

const fn default_error_rate_threshold() -> f64 {
    0.25
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}
