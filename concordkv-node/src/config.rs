//! Node-level configuration: cluster identity plus each component's
//! tunables (§6's "recognized options").

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from a single TOML file and split into
/// the sections each crate already owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// This node's identity and cluster wiring.
    pub node: NodeConfig,
    /// C3 tunables (health, rebalance, hot keys).
    pub service: topology_service::Config,
    /// C4 tunables (queue sizing, idle timeout, retention).
    pub notifier: change_notifier::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            service: topology_service::Config::default(),
            notifier: change_notifier::Config::default(),
        }
    }
}

/// Cluster identity and the admin-surface bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's stable id.
    pub id: String,
    /// Address clients and peers dial for data traffic.
    pub address: String,
    /// Address the admin REST surface binds to.
    pub admin_bind: String,
    /// Total shard count, fixed at bootstrap (§6 default 256).
    pub shard_count: u16,
    /// Whether this node bootstraps a fresh single-node cluster (always
    /// Raft leader) rather than joining an existing one as a peer.
    pub bootstrap: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: "node-1".to_string(),
            address: "127.0.0.1:7000".to_string(),
            admin_bind: "127.0.0.1:8080".to_string(),
            shard_count: 256,
            bootstrap: true,
        }
    }
}

impl Config {
    /// Load from a TOML file; keys absent from the file keep their
    /// default value.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.node.shard_count, 256);
        assert_eq!(cfg.service.health.probe_interval_secs, 30);
        assert_eq!(cfg.notifier.queue_capacity, 1000);
    }
}
