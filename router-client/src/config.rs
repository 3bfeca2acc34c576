//! Router tunables (§4.5 defaults).

use serde::{Deserialize, Serialize};

use crate::policy::ReadPolicy;

/// Retry, pooling and staleness tunables for the router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default read policy when a request doesn't specify one.
    pub default_read_policy: ReadPolicy,
    /// Maximum retry attempts against successive replica candidates.
    pub retry_count: u32,
    /// Base backoff delay between retries, in milliseconds.
    pub backoff_base_ms: u64,
    /// Multiplier applied to the backoff delay after each attempt.
    pub backoff_multiplier: f64,
    /// Symmetric jitter fraction applied to each backoff delay (e.g. 0.2
    /// means +/-20%).
    pub backoff_jitter: f64,
    /// Bounded connection pool size per (shard, node) pair.
    pub pool_size_per_node: usize,
    /// Smoothing factor for the per-node latency EWMA used by `NEAREST`.
    pub latency_ewma_alpha: f64,
    /// How long the client may run on a stale snapshot, with no
    /// successful reconnect to the event stream, before surfacing
    /// `TopologyStale` warnings.
    pub offline_threshold_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_read_policy: ReadPolicy::Replica,
            retry_count: 3,
            backoff_base_ms: 100,
            backoff_multiplier: 2.0,
            backoff_jitter: 0.2,
            pool_size_per_node: 8,
            latency_ewma_alpha: 0.3,
            offline_threshold_secs: 300,
        }
    }
}

impl Config {
    /// Load from a TOML file; keys absent from the file keep their default.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            topology_types::CoreError::InvalidArgument(format!("reading {}: {e}", path.display()))
        })?;
        toml::from_str(&text).map_err(|e| {
            topology_types::CoreError::InvalidArgument(format!("parsing {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.retry_count, 3);
        assert_eq!(cfg.backoff_base_ms, 100);
        assert_eq!(cfg.pool_size_per_node, 8);
        assert_eq!(cfg.offline_threshold_secs, 300);
    }
}
