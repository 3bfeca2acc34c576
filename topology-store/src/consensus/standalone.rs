//! Single-node consensus stand-in: always the leader, commits immediately.
//!
//! Used for single-node deployments and for tests that exercise the
//! `TopologyActor`/invariant/mutation stack without paying for a real Raft
//! quorum.

use super::ConsensusLog;
use crate::mutations::MutationOp;
use crate::Result;
use async_trait::async_trait;

/// Always-leader, in-process [`ConsensusLog`].
#[derive(Debug, Default)]
pub struct StandaloneConsensus;

impl StandaloneConsensus {
    /// Construct a new standalone consensus log.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConsensusLog for StandaloneConsensus {
    async fn propose(&self, op: MutationOp) -> Result<MutationOp> {
        Ok(op)
    }

    fn is_leader(&self) -> bool {
        true
    }

    fn leader_hint(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{NodeDescriptor, NodeId};

    #[tokio::test]
    async fn always_leader_and_commits_immediately() {
        let consensus = StandaloneConsensus::new();
        assert!(consensus.is_leader());
        let op = MutationOp::RegisterNode {
            descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
        };
        let committed = consensus.propose(op).await.unwrap();
        assert!(matches!(committed, MutationOp::RegisterNode { .. }));
    }
}
