//! The five routing policies from §4.5.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use topology_types::{NodeId, Shard};

/// Which replica candidate a read should prefer. Writes always use
/// `Primary` regardless of the configured read policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadPolicy {
    /// Always the shard's primary.
    Primary,
    /// Any in-sync replica, round-robin.
    Replica,
    /// The replica with the lowest observed latency.
    Nearest,
    /// Weighted choice over replicas, inversely proportional to each
    /// replica's last-seen load score.
    LoadBalanced,
    /// Bypasses the shard map entirely; handled by
    /// [`crate::snapshot::LocalTopology::ring_owner`] rather than this
    /// function, so the `Shard` it would otherwise be applied to is never
    /// consulted.
    ConsistentHash,
}

/// Pick a target node from `shard`'s replica set under `policy`.
///
/// `latencies` and `loads` are best-effort signals the router maintains
/// from observed traffic; a replica with no recorded sample is treated as
/// neutral rather than penalized, so routing degrades gracefully before
/// the first observation arrives.
pub fn choose_replica(
    policy: ReadPolicy,
    shard: &Shard,
    round_robin_cursor: &AtomicUsize,
    latencies: &DashMap<NodeId, f64>,
    loads: &DashMap<NodeId, f64>,
) -> NodeId {
    match policy {
        ReadPolicy::Primary | ReadPolicy::ConsistentHash => shard.primary.clone(),
        ReadPolicy::Replica => {
            let idx = round_robin_cursor.fetch_add(1, Ordering::Relaxed) % shard.replicas.len();
            shard.replicas[idx].clone()
        }
        ReadPolicy::Nearest => shard
            .replicas
            .iter()
            .min_by(|a, b| {
                let latency_a = latencies.get(*a).map(|v| *v).unwrap_or(f64::MAX);
                let latency_b = latencies.get(*b).map(|v| *v).unwrap_or(f64::MAX);
                latency_a.partial_cmp(&latency_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
            .unwrap_or_else(|| shard.primary.clone()),
        ReadPolicy::LoadBalanced => weighted_by_inverse_load(&shard.replicas, loads),
    }
}

fn weighted_by_inverse_load(replicas: &[NodeId], loads: &DashMap<NodeId, f64>) -> NodeId {
    let weights: Vec<f64> = replicas
        .iter()
        .map(|node| 1.0 / loads.get(node).map(|v| *v).unwrap_or(1.0).max(0.001))
        .collect();
    let total: f64 = weights.iter().sum();
    let mut pick = rand::thread_rng().gen_range(0.0..total);
    for (node, weight) in replicas.iter().zip(weights.iter()) {
        if pick < *weight {
            return node.clone();
        }
        pick -= *weight;
    }
    replicas.last().cloned().unwrap_or_else(|| replicas[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{KeyRange, ShardId};

    fn shard(replicas: &[&str]) -> Shard {
        Shard::bootstrap(
            ShardId::new(0),
            KeyRange { low: 0, high: u64::MAX },
            replicas.iter().map(|n| NodeId::new(*n)).collect(),
        )
    }

    #[test]
    fn primary_always_returns_the_primary() {
        let s = shard(&["n1", "n2", "n3"]);
        let cursor = AtomicUsize::new(0);
        let node = choose_replica(ReadPolicy::Primary, &s, &cursor, &DashMap::new(), &DashMap::new());
        assert_eq!(node, NodeId::new("n1"));
    }

    #[test]
    fn replica_round_robins_across_calls() {
        let s = shard(&["n1", "n2", "n3"]);
        let cursor = AtomicUsize::new(0);
        let latencies = DashMap::new();
        let loads = DashMap::new();
        let picks: Vec<NodeId> = (0..3)
            .map(|_| choose_replica(ReadPolicy::Replica, &s, &cursor, &latencies, &loads))
            .collect();
        assert_eq!(picks, vec![NodeId::new("n1"), NodeId::new("n2"), NodeId::new("n3")]);
    }

    #[test]
    fn nearest_prefers_the_lowest_latency_sample() {
        let s = shard(&["n1", "n2"]);
        let cursor = AtomicUsize::new(0);
        let latencies = DashMap::new();
        latencies.insert(NodeId::new("n1"), 50.0);
        latencies.insert(NodeId::new("n2"), 5.0);
        let node = choose_replica(ReadPolicy::Nearest, &s, &cursor, &latencies, &DashMap::new());
        assert_eq!(node, NodeId::new("n2"));
    }

    #[test]
    fn load_balanced_never_picks_outside_the_replica_set() {
        let s = shard(&["n1", "n2"]);
        let cursor = AtomicUsize::new(0);
        let loads = DashMap::new();
        loads.insert(NodeId::new("n1"), 10.0);
        loads.insert(NodeId::new("n2"), 1.0);
        for _ in 0..20 {
            let node = choose_replica(ReadPolicy::LoadBalanced, &s, &cursor, &DashMap::new(), &loads);
            assert!(s.replicas.contains(&node));
        }
    }
}
