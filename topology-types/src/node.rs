//! Node identity, descriptors and health.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new node id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Declared resource hints a node advertises at registration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityHints {
    /// Advertised storage capacity, in bytes.
    pub storage_bytes: u64,
    /// Advertised memory capacity, in bytes.
    pub memory_bytes: u64,
}

impl Default for CapacityHints {
    fn default() -> Self {
        Self {
            storage_bytes: 0,
            memory_bytes: 0,
        }
    }
}

/// Static descriptor for a cluster member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Stable identifier.
    pub id: NodeId,
    /// Network address clients and peers dial.
    pub address: String,
    /// Positive ring weight; default 1. Higher weight gets proportionally
    /// more virtual nodes and thus more key-space share.
    pub weight: u32,
    /// Declared capacity hints from registration.
    pub capacity_hints: CapacityHints,
}

impl NodeDescriptor {
    /// Create a descriptor with the default weight of 1 and no capacity hints.
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            weight: 1,
            capacity_hints: CapacityHints::default(),
        }
    }

    /// Builder-style weight override.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }
}

/// Health status lifecycle for a node, per §4.3's probe state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Passing probes, eligible to hold primary or replica assignments.
    Healthy,
    /// Failing probes but within the grace window; still eligible for
    /// existing assignments but not new ones.
    Suspect,
    /// Exceeded the failure window; must be evicted from every shard it
    /// leads or replicates.
    Failed,
}

/// Rolling health signal for a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeHealth {
    /// Current lifecycle status.
    pub status: HealthStatus,
    /// Consecutive failed probes since the last success.
    pub consecutive_failures: u32,
    /// Unix-epoch milliseconds of the last probe attempt.
    pub last_probe_at_ms: i64,
    /// Exponentially weighted latency average, in milliseconds.
    pub rolling_latency_ms: f64,
    /// Exponentially weighted probe success rate in `[0.0, 1.0]`.
    pub rolling_success_rate: f64,
}

impl Default for NodeHealth {
    fn default() -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            last_probe_at_ms: 0,
            rolling_latency_ms: 0.0,
            rolling_success_rate: 1.0,
        }
    }
}

/// A node as it appears inside a committed `Topology`: its descriptor plus
/// its current health signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Static descriptor.
    pub descriptor: NodeDescriptor,
    /// Current health.
    pub health: NodeHealth,
}

impl NodeRecord {
    /// Construct a freshly-registered, healthy node record.
    pub fn new(descriptor: NodeDescriptor) -> Self {
        Self {
            descriptor,
            health: NodeHealth::default(),
        }
    }
}
