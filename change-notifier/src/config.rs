//! Runtime tunables for the change notifier (§4.4 defaults).

use serde::{Deserialize, Serialize};

/// Per-subscriber tunables and retention sizing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bounded outbound queue capacity per subscriber.
    pub queue_capacity: usize,
    /// A subscriber with no successful delivery for this long is closed.
    pub idle_timeout_secs: u64,
    /// Heartbeats are emitted after this long without a real event.
    pub heartbeat_interval_secs: u64,
    /// How many recent committed events the retention buffer keeps, so a
    /// reconnecting subscriber whose `lastAckedVersion` is still in range
    /// can resume with deltas instead of a full snapshot.
    pub retention_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            idle_timeout_secs: 300,
            heartbeat_interval_secs: 30,
            retention_capacity: 2000,
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
