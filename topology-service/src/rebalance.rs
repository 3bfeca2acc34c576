//! Load-based rebalancing (§4.3).
//!
//! Composite load score per node is a weighted sum of five normalized
//! signals. When the max/min score ratio across nodes exceeds
//! `trigger_ratio`, a plan moves one shard's primary from the most-loaded
//! node to the least-loaded node, provided the least-loaded node is
//! already a replica of some shard the most-loaded node leads. Only
//! replica-reuse moves are planned: picking a brand-new destination via
//! the ring would mean provisioning a replica that does not exist yet,
//! which is a migration (`topology_store::MutationOp::StartMigration`),
//! not a plain `ReassignShard`, and is left to the admin-triggered
//! migration workflow instead of the periodic rebalance pass.

use crate::config::RebalanceConfig;
use std::collections::HashMap;
use topology_types::{NodeId, ShardId, Topology};

/// Raw per-node load sample, as reported by a node's periodic load push.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadSample {
    /// Queries per second, normalized to `[0.0, 1.0]` of capacity.
    pub qps: f64,
    /// Storage utilization, `[0.0, 1.0]`.
    pub storage: f64,
    /// Memory utilization, `[0.0, 1.0]`.
    pub memory: f64,
    /// CPU utilization, `[0.0, 1.0]`.
    pub cpu: f64,
    /// Network utilization, `[0.0, 1.0]`.
    pub network: f64,
}

/// One shard move in a rebalance plan: `shard_id` moves its primary from
/// `from` to `to`.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceMove {
    /// Shard being moved.
    pub shard_id: ShardId,
    /// Current primary.
    pub from: NodeId,
    /// New primary.
    pub to: NodeId,
}

/// Composite weighted load score for one node.
pub fn load_score(sample: &LoadSample, config: &RebalanceConfig) -> f64 {
    config.weight_qps * sample.qps
        + config.weight_storage * sample.storage
        + config.weight_memory * sample.memory
        + config.weight_cpu * sample.cpu
        + config.weight_network * sample.network
}

/// Decide whether load is imbalanced enough to warrant a plan, and if so,
/// produce one: each move targets a shard currently led by the most-loaded
/// node and reassigns it to the least-loaded node that is already one of
/// the shard's replicas, preferring moves that do not require provisioning
/// a brand-new replica via migration.
pub fn plan(
    topology: &Topology,
    loads: &HashMap<NodeId, LoadSample>,
    config: &RebalanceConfig,
) -> Vec<RebalanceMove> {
    let scores: HashMap<NodeId, f64> = loads
        .iter()
        .map(|(node, sample)| (node.clone(), load_score(sample, config)))
        .collect();

    let Some((max_node, max_score)) = max_by_score(&scores) else {
        return Vec::new();
    };
    let Some((min_node, min_score)) = min_by_score(&scores) else {
        return Vec::new();
    };
    if max_score <= 0.0 || max_score / min_score.max(f64::EPSILON) <= config.trigger_ratio {
        return Vec::new();
    }
    if max_node == min_node {
        return Vec::new();
    }

    // One move per evaluation: moving more at once risks overcorrecting
    // past the target and thrashing. The next periodic evaluation will
    // issue another move if the imbalance persists.
    let candidate_shard = topology
        .shards_led_by(&max_node)
        .into_iter()
        .find(|shard_id| {
            topology
                .shards
                .get(shard_id)
                .map(|s| s.replicas.contains(&min_node))
                .unwrap_or(false)
        });

    match candidate_shard {
        Some(shard_id) => vec![RebalanceMove {
            shard_id,
            from: max_node,
            to: min_node,
        }],
        // No shard the overloaded node leads already replicates to the
        // underloaded node, so there is no replica-reuse move to make;
        // provisioning a new replica is the migration workflow's job.
        None => Vec::new(),
    }
}

fn max_by_score(scores: &HashMap<NodeId, f64>) -> Option<(NodeId, f64)> {
    scores
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(n, s)| (n.clone(), *s))
}

fn min_by_score(scores: &HashMap<NodeId, f64>) -> Option<(NodeId, f64)> {
    scores
        .iter()
        .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(n, s)| (n.clone(), *s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{KeyRange, NodeDescriptor, NodeRecord, Shard};

    fn sample(v: f64) -> LoadSample {
        LoadSample { qps: v, storage: v, memory: v, cpu: v, network: v }
    }

    #[test]
    fn no_plan_below_threshold() {
        let config = RebalanceConfig::default();
        let mut loads = HashMap::new();
        loads.insert(NodeId::new("n1"), sample(0.5));
        loads.insert(NodeId::new("n2"), sample(0.5));
        let topology = Topology::empty();
        assert!(plan(&topology, &loads, &config).is_empty());
    }

    #[test]
    fn plans_a_move_when_imbalanced() {
        let config = RebalanceConfig::default();
        let mut loads = HashMap::new();
        loads.insert(NodeId::new("overloaded"), sample(0.9));
        loads.insert(NodeId::new("idle"), sample(0.1));

        let mut topology = Topology::empty();
        topology.nodes.insert(
            NodeId::new("overloaded"),
            NodeRecord::new(NodeDescriptor::new(NodeId::new("overloaded"), "a:1")),
        );
        topology.nodes.insert(
            NodeId::new("idle"),
            NodeRecord::new(NodeDescriptor::new(NodeId::new("idle"), "a:2")),
        );
        topology.shards.insert(
            ShardId::new(0),
            Shard::bootstrap(
                ShardId::new(0),
                KeyRange { low: 0, high: u64::MAX },
                vec![NodeId::new("overloaded"), NodeId::new("idle")],
            ),
        );

        let moves = plan(&topology, &loads, &config);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].from, NodeId::new("overloaded"));
        assert_eq!(moves[0].to, NodeId::new("idle"));
    }
}
