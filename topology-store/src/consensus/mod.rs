//! Consensus abstraction for C2.
//!
//! The spec treats Raft replication of the committed log as a black box;
//! this trait is the seam. [`standalone::StandaloneConsensus`] is an
//! in-process, always-leader stand-in for single-node deployments and
//! tests; [`openraft_adapter::OpenRaftConsensus`] wraps a real `openraft`
//! cluster for multi-node deployments.

mod openraft_adapter;
mod standalone;

pub use openraft_adapter::OpenRaftConsensus;
pub use standalone::StandaloneConsensus;

use crate::mutations::MutationOp;
use crate::Result;
use async_trait::async_trait;

/// A replicated, linearizable log of [`MutationOp`]s.
///
/// `propose` does not return until the op has been committed by a quorum (or
/// fails because this node isn't the leader, or the proposal times out).
/// Implementations do not interpret `MutationOp`; applying it to a
/// `Topology` is [`crate::mutations::apply`]'s job, always run by the
/// actor after a successful `propose`.
#[async_trait]
pub trait ConsensusLog: Send + Sync {
    /// Propose `op` for replication. Resolves once committed.
    async fn propose(&self, op: MutationOp) -> Result<MutationOp>;

    /// Whether this node currently believes itself to be the leader.
    fn is_leader(&self) -> bool;

    /// Best-effort hint at the current leader's address, for `NotLeader`
    /// redirection. `None` if unknown (e.g. election in progress).
    fn leader_hint(&self) -> Option<String>;
}
