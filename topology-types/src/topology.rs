//! The authoritative cluster topology: the single record C2 owns, C3 reads,
//! and C5 caches a derived copy of.

use crate::hash::hash64;
use crate::node::{NodeId, NodeRecord};
use crate::shard::{HotKey, Shard, ShardId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A committed snapshot of the cluster's shard/node assignment.
///
/// `BTreeMap` (rather than `HashMap`) is deliberate: `config_hash` is
/// computed over the bincode encoding of this struct, and a `BTreeMap`
/// serializes its entries in key order, making the hash deterministic across
/// replicas without needing a separate canonicalization pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Monotonically increasing version. Strictly increases with every
    /// committed mutation.
    pub version: u64,
    /// Unix-epoch milliseconds the version was committed.
    pub timestamp_ms: i64,
    /// `shardId -> Shard`. Every id in `[0, shard_count)` appears exactly
    /// once.
    pub shards: BTreeMap<ShardId, Shard>,
    /// `NodeId -> NodeRecord`.
    pub nodes: BTreeMap<NodeId, NodeRecord>,
    /// Keys whose recent access rate exceeded the hot-key threshold.
    pub hot_keys: Vec<HotKey>,
}

impl Topology {
    /// An empty topology at version 0, used only as the pre-bootstrap
    /// placeholder before `CREATE_SHARD` mutations populate it.
    pub fn empty() -> Self {
        Self {
            version: 0,
            timestamp_ms: 0,
            shards: BTreeMap::new(),
            nodes: BTreeMap::new(),
            hot_keys: Vec::new(),
        }
    }

    /// Deterministic digest over `(version, shards, nodes)`, per §3: two
    /// replicas at the same version must produce identical `configHash`.
    /// `hot_keys` and `timestamp_ms` are deliberately excluded — they are
    /// observational, not part of the agreed assignment, and including a
    /// wall-clock timestamp would make the hash diverge between replicas
    /// that committed the same version microseconds apart.
    pub fn config_hash(&self) -> [u8; 32] {
        #[derive(Serialize)]
        struct Hashed<'a> {
            version: u64,
            shards: &'a BTreeMap<ShardId, Shard>,
            nodes: &'a BTreeMap<NodeId, NodeRecord>,
        }
        let hashed = Hashed {
            version: self.version,
            shards: &self.shards,
            nodes: &self.nodes,
        };
        let bytes = bincode::serialize(&hashed).expect("Topology fields are always serializable");
        *blake3::hash(&bytes).as_bytes()
    }

    /// Hex-encoded `config_hash`, convenient for logging and the REST
    /// surface's `GET /topology/version` response.
    pub fn config_hash_hex(&self) -> String {
        hex_encode(&self.config_hash())
    }

    /// Locate the shard owning a given key, by hashing the key and walking
    /// shard key ranges. `O(shard_count)`; fine for the default 256 shards
    /// and avoids keeping a second hash->shard index in sync with `shards`.
    pub fn shard_for_key(&self, key: &[u8]) -> Option<&Shard> {
        let h = hash64(key);
        self.shards.values().find(|s| s.key_range.contains(h))
    }

    /// Every shard id currently assigned to a given node, either as primary
    /// or replica.
    pub fn shards_for_node(&self, node: &NodeId) -> Vec<ShardId> {
        self.shards
            .values()
            .filter(|s| s.replicas.iter().any(|r| r == node))
            .map(|s| s.id)
            .collect()
    }

    /// Every shard id for which `node` is the primary.
    pub fn shards_led_by(&self, node: &NodeId) -> Vec<ShardId> {
        self.shards
            .values()
            .filter(|s| &s.primary == node)
            .map(|s| s.id)
            .collect()
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDescriptor, NodeRecord};
    use crate::shard::KeyRange;

    fn sample() -> Topology {
        let mut t = Topology::empty();
        t.version = 1;
        t.nodes.insert(
            NodeId::new("n1"),
            NodeRecord::new(NodeDescriptor::new("n1", "127.0.0.1:9000")),
        );
        t.shards.insert(
            ShardId::new(0),
            Shard::bootstrap(
                ShardId::new(0),
                KeyRange { low: 0, high: u64::MAX },
                vec![NodeId::new("n1")],
            ),
        );
        t
    }

    #[test]
    fn config_hash_is_deterministic() {
        let a = sample();
        let b = sample();
        assert_eq!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn config_hash_changes_with_version() {
        let a = sample();
        let mut b = sample();
        b.version = 2;
        assert_ne!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn config_hash_ignores_timestamp_and_hot_keys() {
        let a = sample();
        let mut b = sample();
        b.timestamp_ms = 999_999;
        b.hot_keys.push(HotKey {
            key_hash: 42,
            shard_id: ShardId::new(0),
            qps: 500.0,
        });
        assert_eq!(a.config_hash(), b.config_hash());
    }

    #[test]
    fn shard_for_key_finds_owner() {
        let t = sample();
        let shard = t.shard_for_key(b"user:1").unwrap();
        assert_eq!(shard.id, ShardId::new(0));
    }
}
