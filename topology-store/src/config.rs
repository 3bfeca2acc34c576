//! Configuration for the topology store (C2), per §6's recognized options.
//!
//! Grounded on `ledger_core::config::Config`'s struct-with-`Default` shape
//! and its `from_file`/`from_env` loaders.

use serde::{Deserialize, Serialize};

/// C2 configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fixed at bootstrap: total number of shards (`shardCount`).
    pub shard_count: u16,

    /// Replicas per shard, including primary (`replicationFactor`).
    pub replication_factor: usize,

    /// Capacity of the in-memory event ring buffer per subscriber before a
    /// slow subscriber is fast-forwarded with a `FullSnapshot`
    /// (`subscriberQueueSize` default 1000).
    pub event_buffer_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_count: 256,
            replication_factor: 3,
            event_buffer_capacity: 1000,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.shard_count, 256);
        assert_eq!(config.replication_factor, 3);
        assert_eq!(config.event_buffer_capacity, 1000);
    }
}
