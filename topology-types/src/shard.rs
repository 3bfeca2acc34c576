//! Shard identity, key ranges and the migration state machine's states.

use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shard identifier, stable for the lifetime of the cluster (`shardCount` is
/// fixed at bootstrap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub u16);

impl ShardId {
    /// Wrap a raw shard number.
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    /// The raw shard number.
    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

/// A half-open `[low, high)` range over the 64-bit hash space. The last
/// shard's range has `high == u64::MAX` so the union of all ranges covers
/// the space with no gap, per §3's coverage invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    /// Inclusive lower bound.
    pub low: u64,
    /// Exclusive upper bound (`u64::MAX` acts as the wraparound sentinel for
    /// the final shard, since an exclusive bound one past `u64::MAX` cannot
    /// be represented).
    pub high: u64,
}

impl KeyRange {
    /// Whether a hash falls within this range. The final shard (whose
    /// `high` is `u64::MAX`) is treated as inclusive on both ends so the
    /// maximum hash value is always owned by some shard.
    pub fn contains(&self, hash: u64) -> bool {
        if self.high == u64::MAX {
            hash >= self.low
        } else {
            hash >= self.low && hash < self.high
        }
    }

    /// Split the full hash space into `count` contiguous, equal-width
    /// ranges. Used at bootstrap to assign each of the `shardCount` shards
    /// its slice of the space.
    pub fn bootstrap_ranges(count: u16) -> Vec<KeyRange> {
        assert!(count > 0, "shard count must be positive");
        let width = u64::MAX / count as u64;
        (0..count)
            .map(|i| {
                let low = width * i as u64;
                let high = if i as u32 + 1 == count as u32 {
                    u64::MAX
                } else {
                    width * (i as u64 + 1)
                };
                KeyRange { low, high }
            })
            .collect()
    }
}

/// Lifecycle state of a shard, per §3 and the §4.3 migration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardState {
    /// Normal serving state.
    Active,
    /// A migration to `migration_target` is in progress.
    Migrating,
    /// Writes are fenced during cut-over; reads still served from the
    /// current primary.
    ReadOnly,
    /// Decommissioned; no longer routable.
    Offline,
}

/// Authoritative assignment record for one shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shard {
    /// Stable id.
    pub id: ShardId,
    /// The slice of the hash space this shard owns.
    pub key_range: KeyRange,
    /// Current writable owner. Always `replicas[0]`.
    pub primary: NodeId,
    /// Ordered replica set, primary first, length == replication factor.
    pub replicas: Vec<NodeId>,
    /// Current lifecycle state.
    pub state: ShardState,
    /// Set iff `state == Migrating` or `ReadOnly`.
    pub migration_target: Option<NodeId>,
    /// Migration completion percentage, `0..=100`.
    pub progress_percent: u8,
}

impl Shard {
    /// Construct a freshly bootstrapped, active shard.
    pub fn bootstrap(id: ShardId, key_range: KeyRange, replicas: Vec<NodeId>) -> Self {
        let primary = replicas[0].clone();
        Self {
            id,
            key_range,
            primary,
            replicas,
            state: ShardState::Active,
            migration_target: None,
            progress_percent: 0,
        }
    }
}

/// A key whose recent access rate exceeded the configured threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotKey {
    /// The key hash (raw keys are not retained server-side).
    pub key_hash: u64,
    /// Shard the key belongs to.
    pub shard_id: ShardId,
    /// Observed queries-per-second over the tracking window.
    pub qps: f64,
}
