use std::collections::BTreeMap;
use topology_types::{hash64, NodeId};
use tracing::{debug, info};

/// Default number of virtual nodes ("tokens") per physical node at weight 1.
pub const DEFAULT_VIRTUAL_COUNT: usize = 200;

/// Default replica-list length returned by `replicas_for`.
pub const DEFAULT_REPLICATION_FACTOR: usize = 3;

/// Default load-imbalance threshold: a node is flagged once its load
/// deviates from the mean by more than this fraction.
pub const DEFAULT_IMBALANCE_THRESHOLD: f64 = 0.20;

#[derive(Debug, Clone)]
struct RingEntry {
    token: u64,
    node: NodeId,
}

#[derive(Debug, Clone)]
struct Membership {
    weight: u32,
}

/// A consistent-hash ring over the 64-bit hash space.
///
/// Virtual nodes let each physical node own many scattered positions on the
/// ring (`virtual_count * weight` of them), which is what keeps the
/// reshuffle on membership change close to the theoretical `1/N` bound
/// instead of moving arbitrarily large contiguous spans.
#[derive(Debug, Clone)]
pub struct HashRing {
    virtual_count: usize,
    replication_factor: usize,
    // Sorted ascending by token. Kept as a flat Vec rather than a
    // `BTreeMap<u64, NodeId>` because two distinct virtual tokens can
    // legitimately hash to the same 64-bit value under adversarial input;
    // a map would silently drop one.
    entries: Vec<RingEntry>,
    nodes: BTreeMap<NodeId, Membership>,
}

impl HashRing {
    /// Construct an empty ring.
    pub fn new(virtual_count: usize, replication_factor: usize) -> Self {
        assert!(virtual_count > 0, "virtual_count must be positive");
        assert!(replication_factor > 0, "replication_factor must be positive");
        Self {
            virtual_count,
            replication_factor,
            entries: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Register a node with the given weight, placing
    /// `virtual_count * weight` tokens on the ring.
    ///
    /// Panics on a duplicate node id or non-positive weight: both indicate a
    /// bug in the caller (C3 is expected to de-duplicate registrations and
    /// validate weight before calling this), not a recoverable runtime
    /// condition, per §4.1's failure semantics.
    pub fn add_node(&mut self, node: NodeId, weight: u32) {
        assert!(weight > 0, "node weight must be positive, got 0 for {node}");
        assert!(
            !self.nodes.contains_key(&node),
            "duplicate node id in ring: {node}"
        );

        let token_count = self.virtual_count * weight as usize;
        for i in 0..token_count {
            let token_key = format!("{node}:{i}");
            let token = hash64(token_key.as_bytes());
            self.entries.push(RingEntry {
                token,
                node: node.clone(),
            });
        }
        self.entries.sort_by_key(|e| e.token);
        self.nodes.insert(node.clone(), Membership { weight });

        info!(node_id = %node, weight, tokens = token_count, "added node to hash ring");
    }

    /// Remove a node and all of its virtual tokens. Returns `false` if the
    /// node was not a member.
    pub fn remove_node(&mut self, node: &NodeId) -> bool {
        let existed = self.nodes.remove(node).is_some();
        if existed {
            self.entries.retain(|e| &e.node != node);
            info!(node_id = %node, "removed node from hash ring");
        }
        existed
    }

    /// Re-register a node with a new weight (used by the rebalancer when
    /// reweighting to correct load imbalance). Equivalent to remove + add.
    pub fn reweight_node(&mut self, node: &NodeId, new_weight: u32) {
        if self.nodes.contains_key(node) {
            self.remove_node(node);
        }
        self.add_node(node.clone(), new_weight);
    }

    /// Number of distinct physical nodes currently on the ring.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All physical nodes currently on the ring.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().cloned().collect()
    }

    /// Ordered replica candidates for a key: walk clockwise from the key's
    /// hash, collecting distinct node ids until `replicas` are gathered or
    /// the whole ring has been scanned once (wrapping around).
    pub fn replicas_for(&self, key: &[u8]) -> Vec<NodeId> {
        self.replicas_for_n(key, self.replication_factor)
    }

    /// Same as `replicas_for` but with an explicit replica count, used by
    /// the rebalancer to ask "what would this key's replica set look like
    /// with N replicas".
    pub fn replicas_for_n(&self, key: &[u8], n: usize) -> Vec<NodeId> {
        if self.entries.is_empty() || n == 0 {
            return Vec::new();
        }
        let hash = hash64(key);
        let start = self
            .entries
            .partition_point(|e| e.token < hash);

        let mut out: Vec<NodeId> = Vec::with_capacity(n.min(self.nodes.len()));
        let len = self.entries.len();
        for offset in 0..len {
            let idx = (start + offset) % len;
            let node = &self.entries[idx].node;
            if !out.contains(node) {
                out.push(node.clone());
                if out.len() == n || out.len() == self.nodes.len() {
                    break;
                }
            }
        }
        out
    }

    /// Primary (first replica candidate) for a key, or `None` if the ring
    /// is empty.
    pub fn primary_for(&self, key: &[u8]) -> Option<NodeId> {
        self.replicas_for_n(key, 1).into_iter().next()
    }

    /// Compare per-node load samples against the mean and report nodes
    /// deviating by more than `threshold` (fraction, default 0.20).
    ///
    /// This is the structural, ring-level imbalance check from §4.1. It is
    /// deliberately simpler than §4.3's weighted composite load score: it
    /// exists so the ring can answer "does my current token placement look
    /// skewed" independent of the richer QPS/storage/CPU scoring that lives
    /// in `topology-service`.
    pub fn imbalance_report(
        &self,
        loads: &BTreeMap<NodeId, f64>,
        threshold: f64,
    ) -> Option<ImbalanceReport> {
        if loads.is_empty() {
            return None;
        }
        let mean = loads.values().sum::<f64>() / loads.len() as f64;
        if mean == 0.0 {
            return None;
        }
        let mut overloaded = Vec::new();
        let mut underloaded = Vec::new();
        for (node, &load) in loads {
            let deviation = (load - mean) / mean;
            if deviation > threshold {
                overloaded.push(node.clone());
            } else if deviation < -threshold {
                underloaded.push(node.clone());
            }
        }
        if overloaded.is_empty() && underloaded.is_empty() {
            debug!(mean, "ring load within threshold, no imbalance");
            return None;
        }
        Some(ImbalanceReport {
            mean,
            overloaded,
            underloaded,
        })
    }
}

/// Result of `HashRing::imbalance_report`: which nodes are over/under the
/// mean by more than the configured threshold. The remedy (reweighting,
/// moving shards) is applied by C3, never by the ring itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ImbalanceReport {
    /// Mean load across all sampled nodes.
    pub mean: f64,
    /// Nodes loaded more than `threshold` above the mean.
    pub overloaded: Vec<NodeId>,
    /// Nodes loaded more than `threshold` below the mean.
    pub underloaded: Vec<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_with(nodes: &[&str]) -> HashRing {
        let mut ring = HashRing::new(200, 3);
        for n in nodes {
            ring.add_node(NodeId::new(*n), 1);
        }
        ring
    }

    #[test]
    #[should_panic(expected = "duplicate node id")]
    fn rejects_duplicate_node() {
        let mut ring = ring_with(&["n1"]);
        ring.add_node(NodeId::new("n1"), 1);
    }

    #[test]
    #[should_panic(expected = "positive")]
    fn rejects_zero_weight() {
        let mut ring = HashRing::new(200, 3);
        ring.add_node(NodeId::new("n1"), 0);
    }

    #[test]
    fn determinism_same_nodes_same_mapping() {
        let a = ring_with(&["n1", "n2", "n3"]);
        let b = ring_with(&["n1", "n2", "n3"]);
        for i in 0..10_000 {
            let key = format!("key-{i}");
            assert_eq!(
                a.replicas_for(key.as_bytes()),
                b.replicas_for(key.as_bytes())
            );
        }
    }

    #[test]
    fn replicas_are_distinct_and_bounded() {
        let ring = ring_with(&["n1", "n2", "n3", "n4"]);
        for i in 0..1000 {
            let key = format!("key-{i}");
            let replicas = ring.replicas_for(key.as_bytes());
            assert_eq!(replicas.len(), 3);
            let mut seen = replicas.clone();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), replicas.len(), "replicas must be distinct");
        }
    }

    #[test]
    fn fewer_nodes_than_replication_factor_returns_all() {
        let ring = ring_with(&["n1", "n2"]);
        let replicas = ring.replicas_for(b"any-key");
        assert_eq!(replicas.len(), 2);
    }

    #[test]
    fn bounded_reshuffle_on_node_addition() {
        let mut ring = ring_with(&["n1", "n2", "n3", "n4"]);
        let n = 100_000;
        let keys: Vec<String> = (0..n).map(|i| format!("key-{i}")).collect();
        let before: Vec<NodeId> = keys
            .iter()
            .map(|k| ring.primary_for(k.as_bytes()).unwrap())
            .collect();

        ring.add_node(NodeId::new("n5"), 1);

        let after: Vec<NodeId> = keys
            .iter()
            .map(|k| ring.primary_for(k.as_bytes()).unwrap())
            .collect();

        let changed = before.iter().zip(after.iter()).filter(|(a, b)| a != b).count();
        let fraction = changed as f64 / n as f64;
        // Expected ~= 1/(N+1) = 0.2, allow generous epsilon for virtual-node
        // placement variance at 200 tokens/node.
        assert!(
            fraction < 0.25,
            "expected bounded reshuffle near 1/5, got {fraction}"
        );
    }

    #[test]
    fn removing_a_node_only_reassigns_its_keys() {
        let mut ring = ring_with(&["n1", "n2", "n3", "n4"]);
        let n = 20_000;
        let keys: Vec<String> = (0..n).map(|i| format!("key-{i}")).collect();
        let before: Vec<NodeId> = keys
            .iter()
            .map(|k| ring.primary_for(k.as_bytes()).unwrap())
            .collect();

        ring.remove_node(&NodeId::new("n2"));

        for (key, prior) in keys.iter().zip(before.iter()) {
            let now = ring.primary_for(key.as_bytes()).unwrap();
            if prior.as_str() != "n2" {
                assert_eq!(&now, prior, "key owned by a surviving node must not move");
            }
        }
    }

    #[test]
    fn imbalance_report_flags_deviation() {
        let ring = ring_with(&["n1", "n2", "n3"]);
        let mut loads = BTreeMap::new();
        loads.insert(NodeId::new("n1"), 90.0);
        loads.insert(NodeId::new("n2"), 30.0);
        loads.insert(NodeId::new("n3"), 30.0);
        let report = ring.imbalance_report(&loads, 0.20).unwrap();
        assert!(report.overloaded.contains(&NodeId::new("n1")));
        assert!(report.underloaded.contains(&NodeId::new("n2")));
    }

    #[test]
    fn imbalance_report_none_when_even() {
        let ring = ring_with(&["n1", "n2", "n3"]);
        let mut loads = BTreeMap::new();
        loads.insert(NodeId::new("n1"), 50.0);
        loads.insert(NodeId::new("n2"), 52.0);
        loads.insert(NodeId::new("n3"), 49.0);
        assert!(ring.imbalance_report(&loads, 0.20).is_none());
    }
}
