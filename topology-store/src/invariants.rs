//! §3 invariant checks, run on every committed `Topology`.
//!
//! Split into two passes because the spec qualifies the replica-health
//! invariant with "at the time of assignment": a node that later degrades to
//! FAILED does not retroactively make an already-committed assignment
//! invalid (that is the health monitor's job to notice and fix via a
//! `ReassignShard`), so `check` (structural, runs after every mutation) does
//! not re-verify health, while `check_assignment_health` (only run
//! immediately after an assignment-producing mutation) does.

use crate::{Error, Result};
use topology_types::{HealthStatus, NodeId, ShardId, ShardState, Topology};

/// Structural invariants that must hold after every committed mutation,
/// regardless of which op produced it.
pub fn check(topology: &Topology, shard_count: u16) -> Result<()> {
    check_replica_shape(topology)?;
    check_full_coverage_if_bootstrapped(topology, shard_count)?;
    Ok(())
}

fn check_replica_shape(topology: &Topology) -> Result<()> {
    for shard in topology.shards.values() {
        if shard.replicas.first() != Some(&shard.primary) {
            return Err(Error::InvariantViolation(format!(
                "shard {} primary {} is not replicas[0]",
                shard.id, shard.primary
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for replica in &shard.replicas {
            if !seen.insert(replica) {
                return Err(Error::InvariantViolation(format!(
                    "shard {} has duplicate replica {}",
                    shard.id, replica
                )));
            }
            if !topology.nodes.contains_key(replica) {
                return Err(Error::InvariantViolation(format!(
                    "shard {} replica {} is not a registered node",
                    shard.id, replica
                )));
            }
        }
        match shard.state {
            ShardState::Migrating | ShardState::ReadOnly => {
                if shard.migration_target.is_none() {
                    return Err(Error::InvariantViolation(format!(
                        "shard {} is {:?} but has no migration_target",
                        shard.id, shard.state
                    )));
                }
            }
            ShardState::Active | ShardState::Offline => {
                if shard.migration_target.is_some() {
                    return Err(Error::InvariantViolation(format!(
                        "shard {} is {:?} but has a migration_target set",
                        shard.id, shard.state
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Full hash-space coverage (§3: "union of all shards' key ranges covers the
/// full hash space with no gap or overlap") is enforced once the cluster has
/// finished bootstrapping — i.e. once every shard in `[0, shard_count)` has
/// been created. Before that point the cluster is mid-bootstrap and partial
/// coverage is expected; `shard_count` itself is fixed at bootstrap and never
/// changes afterward, so this check becomes permanently active the moment
/// bootstrap completes.
fn check_full_coverage_if_bootstrapped(topology: &Topology, shard_count: u16) -> Result<()> {
    if topology.shards.len() < shard_count as usize {
        return Ok(());
    }
    if topology.shards.len() > shard_count as usize {
        return Err(Error::InvariantViolation(format!(
            "expected exactly {shard_count} shards, found {}",
            topology.shards.len()
        )));
    }
    let expected_ids: std::collections::HashSet<ShardId> =
        (0..shard_count).map(ShardId::new).collect();
    let actual_ids: std::collections::HashSet<ShardId> = topology.shards.keys().copied().collect();
    if expected_ids != actual_ids {
        return Err(Error::InvariantViolation(
            "shard ids do not cover [0, shard_count) exactly once".into(),
        ));
    }

    let mut ranges: Vec<(u64, u64)> = topology
        .shards
        .values()
        .map(|s| (s.key_range.low, s.key_range.high))
        .collect();
    ranges.sort();

    let mut expected_low = 0u64;
    for (low, high) in &ranges {
        if *low != expected_low {
            return Err(Error::InvariantViolation(format!(
                "gap or overlap in key-range coverage at {low} (expected {expected_low})"
            )));
        }
        expected_low = *high;
    }
    if expected_low != u64::MAX {
        return Err(Error::InvariantViolation(
            "key ranges do not cover the full hash space".into(),
        ));
    }
    Ok(())
}

/// Replica-health invariant, checked only immediately after a mutation that
/// produces a new assignment for `shard_id` (`CreateShard`, `ReassignShard`,
/// `CompleteMigration`): none of the new replicas may already be `Failed`.
pub fn check_assignment_health(topology: &Topology, shard_id: ShardId) -> Result<()> {
    let shard = topology
        .shards
        .get(&shard_id)
        .ok_or_else(|| Error::NotFound(format!("shard {shard_id}")))?;
    for replica in &shard.replicas {
        if let Some(record) = topology.nodes.get(replica) {
            if record.health.status == HealthStatus::Failed {
                return Err(Error::InvariantViolation(format!(
                    "shard {shard_id} assigns replica {replica} which is FAILED"
                )));
            }
        }
    }
    Ok(())
}

/// Helper for the health monitor: the node, if any, that should be promoted
/// to primary when `current_primary` of `shard_id` has failed — the first
/// HEALTHY replica after the primary in the replica list.
pub fn next_healthy_replica(topology: &Topology, shard_id: ShardId) -> Option<NodeId> {
    let shard = topology.shards.get(&shard_id)?;
    shard
        .replicas
        .iter()
        .skip(1)
        .find(|r| {
            topology
                .nodes
                .get(*r)
                .map(|n| n.health.status == HealthStatus::Healthy)
                .unwrap_or(false)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{KeyRange, NodeDescriptor, NodeRecord, Shard};

    fn topo_with_one_shard(range: KeyRange) -> Topology {
        let mut t = Topology::empty();
        t.nodes.insert(
            NodeId::new("n1"),
            NodeRecord::new(NodeDescriptor::new("n1", "a:1")),
        );
        t.shards.insert(
            ShardId::new(0),
            Shard::bootstrap(ShardId::new(0), range, vec![NodeId::new("n1")]),
        );
        t
    }

    #[test]
    fn full_coverage_accepts_exact_partition() {
        let t = topo_with_one_shard(KeyRange { low: 0, high: u64::MAX });
        assert!(check(&t, 1).is_ok());
    }

    #[test]
    fn full_coverage_rejects_gap() {
        let t = topo_with_one_shard(KeyRange { low: 0, high: u64::MAX / 2 });
        assert!(check(&t, 1).is_err());
    }

    #[test]
    fn partial_bootstrap_is_tolerated_below_shard_count() {
        let t = topo_with_one_shard(KeyRange { low: 0, high: u64::MAX / 2 });
        // shard_count = 2, only 1 shard created so far: not yet checked.
        assert!(check(&t, 2).is_ok());
    }

    #[test]
    fn rejects_duplicate_replica() {
        let mut t = topo_with_one_shard(KeyRange { low: 0, high: u64::MAX });
        t.shards.get_mut(&ShardId::new(0)).unwrap().replicas =
            vec![NodeId::new("n1"), NodeId::new("n1")];
        assert!(check(&t, 1).is_err());
    }
}
