//! Process configuration
//!
//! Each role reads its settings from an optional TOML file, then from
//! `DISTSORT_*` environment variables, then from command-line flags. Every
//! field has a default so an empty file (or no file) is a valid config.
//!
//! ```toml
//! # worker.toml
//! coordinator = "10.0.0.1:4000"
//! bind = "0.0.0.0:0"
//! advertise_host = "10.0.0.7"
//! failure_probability = 0.1
//! load_threshold = 2.5
//!
//! [network]
//! connect_timeout = "2s"
//! request_timeout = "1m"
//! ```

pub mod loader;

pub use loader::load_config;

use crate::error::{DistSortError, Result};
use crate::model::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const ENV_FAILURE_PROBABILITY: &str = "DISTSORT_FAILURE_PROBABILITY";
pub const ENV_LOAD_THRESHOLD: &str = "DISTSORT_LOAD_THRESHOLD";
pub const ENV_COORDINATOR: &str = "DISTSORT_COORDINATOR";

/// Deadlines applied to every outbound call and inbound request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(DistSortError::config("network timeouts must be non-zero"));
        }
        Ok(())
    }
}

/// Exponential delay between the coordinator's outer attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_initial_delay", with = "humantime_serde")]
    pub initial_delay: Duration,

    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
        }
    }
}

impl BackoffConfig {
    /// Delay before retrying after the given 1-based failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Settings for the coordinator process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Address the coordinator listens on
    #[serde(default = "default_coordinator_address")]
    pub bind: String,

    /// Outer map/reduce attempts per submission
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Full registry passes the map phase may make per attempt
    #[serde(default = "default_max_sweeps")]
    pub max_sweeps: u32,

    /// Consecutive connectivity failures before a worker is dropped
    #[serde(default = "default_evict_after")]
    pub evict_after: u32,

    #[serde(default)]
    pub backoff: BackoffConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind: default_coordinator_address(),
            max_attempts: default_max_attempts(),
            max_sweeps: default_max_sweeps(),
            evict_after: default_evict_after(),
            backoff: BackoffConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DistSortError::config("max_attempts must be at least 1"));
        }
        if self.max_sweeps == 0 {
            return Err(DistSortError::config("max_sweeps must be at least 1"));
        }
        if self.evict_after == 0 {
            return Err(DistSortError::config("evict_after must be at least 1"));
        }
        if !(self.backoff.multiplier.is_finite() && self.backoff.multiplier >= 1.0) {
            return Err(DistSortError::config("backoff multiplier must be at least 1.0"));
        }
        self.network.validate()
    }
}

/// Settings for a worker process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Coordinator to register with, as `host:port`
    #[serde(default = "default_coordinator_address")]
    pub coordinator: String,

    /// Address the worker listens on; port 0 picks a free port
    #[serde(default = "default_worker_bind")]
    pub bind: String,

    /// Host advertised to the coordinator instead of the bound address
    #[serde(default)]
    pub advertise_host: Option<String>,

    /// Chance in [0, 1] that a local sort is forced to fail
    #[serde(default)]
    pub failure_probability: f64,

    /// Load above which a sort is offered to peers first
    #[serde(default = "default_load_threshold")]
    pub load_threshold: f64,

    /// Where every successful local sort is written
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            coordinator: default_coordinator_address(),
            bind: default_worker_bind(),
            advertise_host: None,
            failure_probability: 0.0,
            load_threshold: default_load_threshold(),
            artifact_path: default_artifact_path(),
            network: NetworkConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Apply overrides from the process environment
    pub fn merge_env_vars(&mut self) {
        self.merge_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn merge_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(ENV_FAILURE_PROBABILITY) {
            match value.trim().parse::<f64>() {
                Ok(p) => self.failure_probability = p,
                Err(e) => warn!("Ignoring {}={}: {}", ENV_FAILURE_PROBABILITY, value, e),
            }
        }

        if let Some(value) = lookup(ENV_LOAD_THRESHOLD) {
            match value.trim().parse::<f64>() {
                Ok(t) => self.load_threshold = t,
                Err(e) => warn!("Ignoring {}={}: {}", ENV_LOAD_THRESHOLD, value, e),
            }
        }

        if let Some(value) = lookup(ENV_COORDINATOR) {
            self.coordinator = value.trim().to_string();
        }
    }

    pub fn coordinator_endpoint(&self) -> Result<Endpoint> {
        self.coordinator.parse()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.failure_probability) {
            return Err(DistSortError::config(format!(
                "failure_probability must be within [0, 1], got {}",
                self.failure_probability
            )));
        }
        if self.load_threshold.is_nan() || self.load_threshold <= 0.0 {
            return Err(DistSortError::config(format!(
                "load_threshold must be positive, got {}",
                self.load_threshold
            )));
        }
        self.coordinator_endpoint()?;
        self.network.validate()
    }
}

/// Settings for the submission client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_coordinator_address")]
    pub coordinator: String,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Deadline for a whole map/reduce round trip
    #[serde(default = "default_submit_timeout", with = "humantime_serde")]
    pub submit_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            coordinator: default_coordinator_address(),
            connect_timeout: default_connect_timeout(),
            submit_timeout: default_submit_timeout(),
        }
    }
}

impl ClientConfig {
    pub fn merge_env_vars(&mut self) {
        if let Ok(value) = std::env::var(ENV_COORDINATOR) {
            self.coordinator = value.trim().to_string();
        }
    }

    pub fn coordinator_endpoint(&self) -> Result<Endpoint> {
        self.coordinator.parse()
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() || self.submit_timeout.is_zero() {
            return Err(DistSortError::config("client timeouts must be non-zero"));
        }
        self.coordinator_endpoint().map(|_| ())
    }
}

fn default_coordinator_address() -> String {
    "127.0.0.1:4000".to_string()
}

fn default_worker_bind() -> String {
    "127.0.0.1:0".to_string()
}

fn default_load_threshold() -> f64 {
    1.0
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("intermediate.sorted")
}

fn default_max_attempts() -> u32 {
    5
}

fn default_max_sweeps() -> u32 {
    3
}

fn default_evict_after() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(200)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_submit_timeout() -> Duration {
    Duration::from_secs(600)
}
