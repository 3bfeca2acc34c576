//! Migration orchestration (§4.3's per-shard state machine):
//! `Active → Migrating → ReadOnly → Active` (or `→ Offline` for
//! decommissioning).
//!
//! The actual data copy between nodes is the storage engines' job and out
//! of scope here; this module only drives the shard's state transitions in
//! response to admin requests and progress reports from whatever copies
//! the data.

use crate::Result;
use topology_store::{MutationOp, TopologyHandle};
use topology_types::{NodeId, ShardId, Topology};

/// Start migrating `shard_id` to `target`. Fails unless the shard is
/// currently `Active`.
pub async fn start(handle: &TopologyHandle, shard_id: ShardId, target: NodeId) -> Result<Topology> {
    handle
        .propose(MutationOp::StartMigration { shard_id, target })
        .await
}

/// Report progress on an in-flight migration. Reaching 100% transitions the
/// shard to `ReadOnly` to fence writes during cut-over, per the explicit
/// transient state §4.3 calls out as the safer variant.
pub async fn report_progress(handle: &TopologyHandle, shard_id: ShardId, percent: u8) -> Result<Topology> {
    handle
        .propose(MutationOp::UpdateMigrationProgress { shard_id, percent })
        .await
}

/// Finish a migration: the target becomes primary, the shard returns to
/// `Active`. Callers should have already driven `report_progress` to 100.
pub async fn complete(handle: &TopologyHandle, shard_id: ShardId) -> Result<Topology> {
    handle.propose(MutationOp::CompleteMigration { shard_id }).await
}
