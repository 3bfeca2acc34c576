//! Configuration for the topology service (C3), per §6's recognized options.

use serde::{Deserialize, Serialize};

/// C3 configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Health probing.
    pub health: HealthConfig,
    /// Load-based rebalancing.
    pub rebalance: RebalanceConfig,
    /// Hot-key detection.
    pub hot_keys: HotKeyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            health: HealthConfig::default(),
            rebalance: RebalanceConfig::default(),
            hot_keys: HotKeyConfig::default(),
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for any unset field.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::InvalidArgument(format!("failed to read config file: {e}"))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidArgument(format!("failed to parse config: {e}")))
    }
}

/// Health-probe tuning (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Interval between probe rounds, in seconds.
    pub probe_interval_secs: u64,
    /// Per-probe timeout, in seconds.
    pub probe_timeout_secs: u64,
    /// Consecutive failures before HEALTHY → SUSPECT.
    pub suspect_after_failures: u32,
    /// Additional probe cycles after SUSPECT before → FAILED.
    pub failed_after_additional_cycles: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 30,
            probe_timeout_secs: 5,
            suspect_after_failures: 3,
            failed_after_additional_cycles: 2,
        }
    }
}

/// Load-rebalancing tuning (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RebalanceConfig {
    /// Interval between rebalance evaluations, in seconds.
    pub interval_secs: u64,
    /// Weight applied to QPS in the composite load score.
    pub weight_qps: f64,
    /// Weight applied to storage utilization.
    pub weight_storage: f64,
    /// Weight applied to memory utilization.
    pub weight_memory: f64,
    /// Weight applied to CPU utilization.
    pub weight_cpu: f64,
    /// Weight applied to network utilization.
    pub weight_network: f64,
    /// Max/min score ratio that triggers a rebalance plan.
    pub trigger_ratio: f64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            weight_qps: 0.3,
            weight_storage: 0.2,
            weight_memory: 0.2,
            weight_cpu: 0.2,
            weight_network: 0.1,
            trigger_ratio: 1.4,
        }
    }
}

/// Hot-key detection tuning (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HotKeyConfig {
    /// Rolling window size, in seconds.
    pub window_secs: u64,
    /// QPS threshold above which a key is reported as hot.
    pub qps_threshold: f64,
}

impl Default for HotKeyConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            qps_threshold: 100.0,
        }
    }
}
