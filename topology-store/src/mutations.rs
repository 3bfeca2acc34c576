//! The mutation types C2 accepts (§4.2) and the pure function that applies
//! one to a `Topology`, producing a new committed version.
//!
//! `apply` is copy-on-write (§9: "acceptable since versions are relatively
//! infrequent compared to reads") and is the single place version bumps
//! happen — every mutation increments `version` by exactly 1.

use crate::invariants;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use topology_types::{NodeDescriptor, NodeHealth, NodeId, Shard, ShardId, ShardState, Topology};

/// One of the eight mutation types from §4.2.
///
/// Serializable so it can travel as an `openraft` log entry's payload
/// (`AppData`) in addition to being applied locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MutationOp {
    /// Create a new shard with an explicit key range and initial replica
    /// set (primary first). Used during the bootstrap sequence to populate
    /// all `shardCount` shards; full hash-space coverage is enforced once
    /// every shard has been created (see `invariants::check`).
    CreateShard {
        /// The new shard's id.
        id: ShardId,
        /// The slice of hash space it owns.
        key_range: topology_types::KeyRange,
        /// Initial replica set, primary first.
        replicas: Vec<NodeId>,
    },
    /// Replace a shard's primary/replica assignment, e.g. after a failover
    /// promotion or as the final step of a migration.
    ReassignShard {
        /// Shard being reassigned.
        shard_id: ShardId,
        /// New primary (must equal `replicas[0]`).
        primary: NodeId,
        /// New replica set, primary first.
        replicas: Vec<NodeId>,
    },
    /// Begin migrating a shard to a new target node.
    StartMigration {
        /// Shard being migrated.
        shard_id: ShardId,
        /// Destination node.
        target: NodeId,
    },
    /// Record migration progress for a shard already `Migrating`.
    UpdateMigrationProgress {
        /// Shard being migrated.
        shard_id: ShardId,
        /// New completion percentage, `0..=100`.
        percent: u8,
    },
    /// Finish a migration: the target becomes a replica (and, if it was
    /// leading the migration, primary), the shard returns to `Active`.
    CompleteMigration {
        /// Shard whose migration completed.
        shard_id: ShardId,
    },
    /// Register a new cluster member.
    RegisterNode {
        /// The node's descriptor.
        descriptor: NodeDescriptor,
    },
    /// Remove a cluster member. Rejected if it still owns any shard.
    DeregisterNode {
        /// Node being removed.
        node_id: NodeId,
    },
    /// Update a node's health signal (drives HEALTHY/SUSPECT/FAILED
    /// transitions).
    UpdateNodeHealth {
        /// Node whose health changed.
        node_id: NodeId,
        /// New health signal.
        health: NodeHealth,
    },
}

impl MutationOp {
    /// Short tag used in tracing fields and metrics labels.
    pub fn kind_label(&self) -> &'static str {
        match self {
            MutationOp::CreateShard { .. } => "create_shard",
            MutationOp::ReassignShard { .. } => "reassign_shard",
            MutationOp::StartMigration { .. } => "start_migration",
            MutationOp::UpdateMigrationProgress { .. } => "update_migration_progress",
            MutationOp::CompleteMigration { .. } => "complete_migration",
            MutationOp::RegisterNode { .. } => "register_node",
            MutationOp::DeregisterNode { .. } => "deregister_node",
            MutationOp::UpdateNodeHealth { .. } => "update_node_health",
        }
    }
}

/// Apply one mutation to `topology`, returning the new committed topology.
///
/// Does not itself decide leadership or durability — that is the
/// `ConsensusLog`'s job. This function is pure and deterministic so it can
/// run identically on every replica after the `ConsensusLog` delivers the
/// same committed op to each of them.
pub fn apply(topology: &Topology, op: &MutationOp, shard_count: u16, now_ms: i64) -> Result<Topology> {
    let mut next = topology.clone();

    match op {
        MutationOp::CreateShard {
            id,
            key_range,
            replicas,
        } => {
            if replicas.is_empty() {
                return Err(Error::InvalidArgument("replicas must be non-empty".into()));
            }
            if next.shards.contains_key(id) {
                return Err(Error::InvalidArgument(format!("shard {id} already exists")));
            }
            let shard = Shard::bootstrap(*id, *key_range, replicas.clone());
            next.shards.insert(*id, shard);
        }

        MutationOp::ReassignShard {
            shard_id,
            primary,
            replicas,
        } => {
            let shard = next
                .shards
                .get_mut(shard_id)
                .ok_or_else(|| Error::NotFound(format!("shard {shard_id}")))?;
            if replicas.first() != Some(primary) {
                return Err(Error::InvalidArgument(
                    "primary must equal replicas[0]".into(),
                ));
            }
            shard.primary = primary.clone();
            shard.replicas = replicas.clone();
        }

        MutationOp::StartMigration { shard_id, target } => {
            let shard = next
                .shards
                .get_mut(shard_id)
                .ok_or_else(|| Error::NotFound(format!("shard {shard_id}")))?;
            if !matches!(shard.state, ShardState::Active) {
                return Err(Error::InvariantViolation(format!(
                    "shard {shard_id} must be Active to start a migration, is {:?}",
                    shard.state
                )));
            }
            shard.state = ShardState::Migrating;
            shard.migration_target = Some(target.clone());
            shard.progress_percent = 0;
        }

        MutationOp::UpdateMigrationProgress { shard_id, percent } => {
            let shard = next
                .shards
                .get_mut(shard_id)
                .ok_or_else(|| Error::NotFound(format!("shard {shard_id}")))?;
            if !matches!(shard.state, ShardState::Migrating | ShardState::ReadOnly) {
                return Err(Error::InvariantViolation(format!(
                    "shard {shard_id} is not migrating"
                )));
            }
            if *percent > 100 {
                return Err(Error::InvalidArgument("percent must be <= 100".into()));
            }
            shard.progress_percent = *percent;
            // Fence writes for cut-over once the copy is effectively done;
            // the explicit READ_ONLY transient from §4.3's safer variant.
            if *percent >= 100 && matches!(shard.state, ShardState::Migrating) {
                shard.state = ShardState::ReadOnly;
            }
        }

        MutationOp::CompleteMigration { shard_id } => {
            let shard = next
                .shards
                .get_mut(shard_id)
                .ok_or_else(|| Error::NotFound(format!("shard {shard_id}")))?;
            if !matches!(shard.state, ShardState::Migrating | ShardState::ReadOnly) {
                return Err(Error::InvariantViolation(format!(
                    "shard {shard_id} is not migrating"
                )));
            }
            let target = shard
                .migration_target
                .clone()
                .ok_or_else(|| Error::InvariantViolation("missing migration target".into()))?;
            if !shard.replicas.contains(&target) {
                shard.replicas.push(target.clone());
            }
            shard.primary = target;
            shard.state = ShardState::Active;
            shard.migration_target = None;
            shard.progress_percent = 100;
        }

        MutationOp::RegisterNode { descriptor } => {
            if next.nodes.contains_key(&descriptor.id) {
                return Err(Error::InvalidArgument(format!(
                    "node {} already registered",
                    descriptor.id
                )));
            }
            if descriptor.weight == 0 {
                return Err(Error::InvalidArgument("node weight must be positive".into()));
            }
            next.nodes.insert(
                descriptor.id.clone(),
                topology_types::NodeRecord::new(descriptor.clone()),
            );
        }

        MutationOp::DeregisterNode { node_id } => {
            if !next.nodes.contains_key(node_id) {
                return Err(Error::NotFound(format!("node {node_id}")));
            }
            let still_owns = next.shards_for_node(node_id);
            if !still_owns.is_empty() {
                return Err(Error::InvariantViolation(format!(
                    "node {node_id} still owns shards {:?}; reassign before deregistering",
                    still_owns
                )));
            }
            next.nodes.remove(node_id);
        }

        MutationOp::UpdateNodeHealth { node_id, health } => {
            let record = next
                .nodes
                .get_mut(node_id)
                .ok_or_else(|| Error::NotFound(format!("node {node_id}")))?;
            record.health = *health;
        }
    }

    next.version = topology.version + 1;
    next.timestamp_ms = now_ms;

    invariants::check(&next, shard_count)?;

    match op {
        MutationOp::CreateShard { id, .. } => invariants::check_assignment_health(&next, *id)?,
        MutationOp::ReassignShard { shard_id, .. } | MutationOp::CompleteMigration { shard_id } => {
            invariants::check_assignment_health(&next, *shard_id)?
        }
        _ => {}
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{HealthStatus, KeyRange};

    fn node(id: &str) -> NodeDescriptor {
        NodeDescriptor::new(id, format!("{id}.local:9000"))
    }

    #[test]
    fn register_then_create_shard() {
        let t0 = Topology::empty();
        let t1 = apply(
            &t0,
            &MutationOp::RegisterNode {
                descriptor: node("n1"),
            },
            1,
            0,
        )
        .unwrap();
        assert_eq!(t1.version, 1);

        let t2 = apply(
            &t1,
            &MutationOp::CreateShard {
                id: ShardId::new(0),
                key_range: KeyRange { low: 0, high: u64::MAX },
                replicas: vec![NodeId::new("n1")],
            },
            1,
            0,
        )
        .unwrap();
        assert_eq!(t2.version, 2);
        assert_eq!(t2.shards.len(), 1);
    }

    #[test]
    fn reassign_requires_matching_primary() {
        let t0 = Topology::empty();
        let t1 = apply(
            &t0,
            &MutationOp::RegisterNode { descriptor: node("n1") },
            1,
            0,
        )
        .unwrap();
        let t1 = apply(
            &t1,
            &MutationOp::RegisterNode { descriptor: node("n2") },
            1,
            0,
        )
        .unwrap();
        let t2 = apply(
            &t1,
            &MutationOp::CreateShard {
                id: ShardId::new(0),
                key_range: KeyRange { low: 0, high: u64::MAX },
                replicas: vec![NodeId::new("n1"), NodeId::new("n2")],
            },
            1,
            0,
        )
        .unwrap();

        let bad = apply(
            &t2,
            &MutationOp::ReassignShard {
                shard_id: ShardId::new(0),
                primary: NodeId::new("n2"),
                replicas: vec![NodeId::new("n1"), NodeId::new("n2")],
            },
            1,
            0,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn migration_lifecycle() {
        let mut t = Topology::empty();
        t = apply(&t, &MutationOp::RegisterNode { descriptor: node("n1") }, 1, 0).unwrap();
        t = apply(&t, &MutationOp::RegisterNode { descriptor: node("n2") }, 1, 0).unwrap();
        t = apply(
            &t,
            &MutationOp::CreateShard {
                id: ShardId::new(0),
                key_range: KeyRange { low: 0, high: u64::MAX },
                replicas: vec![NodeId::new("n1")],
            },
            1,
            0,
        )
        .unwrap();

        t = apply(
            &t,
            &MutationOp::StartMigration {
                shard_id: ShardId::new(0),
                target: NodeId::new("n2"),
            },
            1,
            0,
        )
        .unwrap();
        assert!(matches!(t.shards[&ShardId::new(0)].state, ShardState::Migrating));

        t = apply(
            &t,
            &MutationOp::UpdateMigrationProgress {
                shard_id: ShardId::new(0),
                percent: 100,
            },
            1,
            0,
        )
        .unwrap();
        assert!(matches!(t.shards[&ShardId::new(0)].state, ShardState::ReadOnly));

        t = apply(
            &t,
            &MutationOp::CompleteMigration {
                shard_id: ShardId::new(0),
            },
            1,
            0,
        )
        .unwrap();
        let shard = &t.shards[&ShardId::new(0)];
        assert!(matches!(shard.state, ShardState::Active));
        assert_eq!(shard.primary, NodeId::new("n2"));
        assert!(shard.replicas.contains(&NodeId::new("n2")));
    }

    #[test]
    fn deregister_rejects_node_that_still_owns_shards() {
        let mut t = Topology::empty();
        t = apply(&t, &MutationOp::RegisterNode { descriptor: node("n1") }, 1, 0).unwrap();
        t = apply(
            &t,
            &MutationOp::CreateShard {
                id: ShardId::new(0),
                key_range: KeyRange { low: 0, high: u64::MAX },
                replicas: vec![NodeId::new("n1")],
            },
            1,
            0,
        )
        .unwrap();

        let result = apply(
            &t,
            &MutationOp::DeregisterNode {
                node_id: NodeId::new("n1"),
            },
            1,
            0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn update_node_health_transitions() {
        let mut t = Topology::empty();
        t = apply(&t, &MutationOp::RegisterNode { descriptor: node("n1") }, 1, 0).unwrap();
        let mut health = NodeHealth::default();
        health.status = HealthStatus::Suspect;
        health.consecutive_failures = 3;
        t = apply(
            &t,
            &MutationOp::UpdateNodeHealth {
                node_id: NodeId::new("n1"),
                health,
            },
            1,
            0,
        )
        .unwrap();
        assert_eq!(t.nodes[&NodeId::new("n1")].health.status, HealthStatus::Suspect);
    }
}
