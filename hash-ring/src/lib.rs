//! Consistent-hash ring with virtual nodes (§4.1, component C1).
//!
//! Maps keys to an ordered list of replica candidates and minimizes the
//! fraction of keys whose ownership changes when membership changes.
//! Grounded on `message-bus::sharding::ConsistentHashRing` from the teacher
//! repo, generalized from a single-hash-per-node ring keyed by `ShardId` to
//! one that places `virtual_count * weight` tokens per physical node and
//! returns replica lists rather than a single shard assignment.
//!
//! Purely in-memory, never fails at runtime: construction-time misuse
//! (duplicate node ids, non-positive weight) panics immediately, per §9's
//! "panics are reserved for invariant violations detected inside the core".

mod ring;

pub use ring::{HashRing, ImbalanceReport, DEFAULT_IMBALANCE_THRESHOLD, DEFAULT_REPLICATION_FACTOR, DEFAULT_VIRTUAL_COUNT};
