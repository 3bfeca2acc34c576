//! Real multi-node consensus via `openraft`.
//!
//! Wraps an `openraft::Raft` instance client-proposal-side: `propose`
//! submits the op through `Raft::client_write` and maps the result back
//! onto [`crate::Error`]. The log/state-machine store here is in-memory
//! (`MemLogStore`/`MemStateMachine`), matching the scope of this crate:
//! the spec treats durable Raft storage and peer-to-peer transport as a
//! black box outside C2, so only the proposal seam needs a concrete,
//! working implementation — not a production WAL.

use super::ConsensusLog;
use crate::mutations::MutationOp;
use crate::{Error, Result};
use async_trait::async_trait;
use openraft::storage::{LogState, RaftLogStorage, RaftStateMachine, Snapshot};
use openraft::{
    BasicNode, Entry, EntryPayload, LogId, OptionalSend, RaftLogReader, RaftSnapshotBuilder,
    SnapshotMeta, StorageError, StorageIOError, StoredMembership, Vote,
};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use topology_types::Topology;

openraft::declare_raft_types!(
    /// Raft type configuration for the topology log: entries carry
    /// `MutationOp`s, responses echo the accepted op back to the proposer.
    pub TypeConfig:
        D = MutationOp,
        R = MutationOp,
        NodeId = u64,
        Node = BasicNode,
        Entry = Entry<TypeConfig>,
        SnapshotData = Cursor<Vec<u8>>,
);

type RaftNodeId = u64;

#[derive(Debug, Default)]
struct MemLogState {
    log: BTreeMap<u64, Entry<TypeConfig>>,
    vote: Option<Vote<RaftNodeId>>,
    last_purged: Option<LogId<RaftNodeId>>,
}

/// In-memory `openraft` log store.
#[derive(Clone, Default)]
pub struct MemLogStore {
    state: Arc<Mutex<MemLogState>>,
}

impl RaftLogReader<TypeConfig> for MemLogStore {
    async fn try_get_log_entries<RB: std::ops::RangeBounds<u64> + Clone + OptionalSend>(
        &mut self,
        range: RB,
    ) -> std::result::Result<Vec<Entry<TypeConfig>>, StorageError<RaftNodeId>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .log
            .range(range)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

impl RaftLogStorage<TypeConfig> for MemLogStore {
    type LogReader = Self;

    async fn get_log_state(&mut self) -> std::result::Result<LogState<TypeConfig>, StorageError<RaftNodeId>> {
        let state = self.state.lock().unwrap();
        let last = state.log.values().last().map(|e| e.log_id);
        Ok(LogState {
            last_purged_log_id: state.last_purged,
            last_log_id: last,
        })
    }

    async fn save_vote(&mut self, vote: &Vote<RaftNodeId>) -> std::result::Result<(), StorageError<RaftNodeId>> {
        self.state.lock().unwrap().vote = Some(*vote);
        Ok(())
    }

    async fn read_vote(&mut self) -> std::result::Result<Option<Vote<RaftNodeId>>, StorageError<RaftNodeId>> {
        Ok(self.state.lock().unwrap().vote)
    }

    async fn append<I>(&mut self, entries: I, callback: openraft::storage::LogFlushed<TypeConfig>)
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
    {
        let mut state = self.state.lock().unwrap();
        for entry in entries {
            state.log.insert(entry.log_id.index, entry);
        }
        drop(state);
        callback.log_io_completed(Ok(()));
    }

    async fn truncate(&mut self, log_id: LogId<RaftNodeId>) -> std::result::Result<(), StorageError<RaftNodeId>> {
        self.state.lock().unwrap().log.split_off(&log_id.index);
        Ok(())
    }

    async fn purge(&mut self, log_id: LogId<RaftNodeId>) -> std::result::Result<(), StorageError<RaftNodeId>> {
        let mut state = self.state.lock().unwrap();
        state.log = state.log.split_off(&(log_id.index + 1));
        state.last_purged = Some(log_id);
        Ok(())
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        self.clone()
    }
}

/// In-memory `openraft` state machine: applies committed `MutationOp`s to a
/// `Topology` exactly the way [`crate::actor::TopologyActor`] does, so the
/// replicated and locally-applied views never diverge.
#[derive(Clone)]
pub struct MemStateMachine {
    topology: Arc<Mutex<Topology>>,
    shard_count: u16,
    last_applied: Arc<Mutex<Option<LogId<RaftNodeId>>>>,
    membership: Arc<Mutex<StoredMembership<RaftNodeId, BasicNode>>>,
}

impl MemStateMachine {
    /// Build a state machine seeded with `initial` and bound to
    /// `shard_count` shards.
    pub fn new(initial: Topology, shard_count: u16) -> Self {
        Self {
            topology: Arc::new(Mutex::new(initial)),
            shard_count,
            last_applied: Arc::new(Mutex::new(None)),
            membership: Arc::new(Mutex::new(StoredMembership::default())),
        }
    }

    /// Snapshot the currently applied topology.
    pub fn topology(&self) -> Topology {
        self.topology.lock().unwrap().clone()
    }
}

impl RaftSnapshotBuilder<TypeConfig> for MemStateMachine {
    async fn build_snapshot(&mut self) -> std::result::Result<Snapshot<TypeConfig>, StorageError<RaftNodeId>> {
        let topology = self.topology.lock().unwrap().clone();
        let last_applied = *self.last_applied.lock().unwrap();
        let membership = self.membership.lock().unwrap().clone();
        let data = bincode::serialize(&topology)
            .map_err(|e| StorageIOError::write_snapshot(None, &e))?;
        Ok(Snapshot {
            meta: SnapshotMeta {
                last_log_id: last_applied,
                last_membership: membership,
                snapshot_id: format!("topology-{}", topology.version),
            },
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

impl RaftStateMachine<TypeConfig> for MemStateMachine {
    type SnapshotBuilder = Self;

    async fn applied_state(
        &mut self,
    ) -> std::result::Result<(Option<LogId<RaftNodeId>>, StoredMembership<RaftNodeId, BasicNode>), StorageError<RaftNodeId>>
    {
        Ok((*self.last_applied.lock().unwrap(), self.membership.lock().unwrap().clone()))
    }

    async fn apply<I>(&mut self, entries: I) -> std::result::Result<Vec<MutationOp>, StorageError<RaftNodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + OptionalSend,
    {
        let mut responses = Vec::new();
        for entry in entries {
            *self.last_applied.lock().unwrap() = Some(entry.log_id);
            match entry.payload {
                EntryPayload::Blank => {}
                EntryPayload::Normal(op) => {
                    let topology = self.topology.lock().unwrap().clone();
                    let now_ms = chrono::Utc::now().timestamp_millis();
                    match crate::mutations::apply(&topology, &op, self.shard_count, now_ms) {
                        Ok(next) => *self.topology.lock().unwrap() = next,
                        Err(e) => tracing::warn!(error = %e, "rejected mutation during raft apply"),
                    }
                    responses.push(op);
                }
                EntryPayload::Membership(membership) => {
                    *self.membership.lock().unwrap() =
                        StoredMembership::new(Some(entry.log_id), membership);
                }
            }
        }
        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        self.clone()
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> std::result::Result<Box<Cursor<Vec<u8>>>, StorageError<RaftNodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<RaftNodeId, BasicNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> std::result::Result<(), StorageError<RaftNodeId>> {
        let topology: Topology = bincode::deserialize(snapshot.get_ref())
            .map_err(|e| StorageIOError::read_snapshot(Some(meta.signature()), &e))?;
        *self.topology.lock().unwrap() = topology;
        *self.last_applied.lock().unwrap() = meta.last_log_id;
        *self.membership.lock().unwrap() = meta.last_membership.clone();
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> std::result::Result<Option<Snapshot<TypeConfig>>, StorageError<RaftNodeId>> {
        Ok(Some(self.build_snapshot().await?))
    }
}

/// [`ConsensusLog`] backed by a real `openraft::Raft<TypeConfig>` cluster.
///
/// Constructing the `Raft` instance (wiring up `MemLogStore`,
/// `MemStateMachine` and a `RaftNetworkFactory` for the deployment's actual
/// transport) is the binary's job (`concordkv-node`); this type only owns
/// the proposal/leadership seam the rest of C2 depends on.
pub struct OpenRaftConsensus {
    raft: openraft::Raft<TypeConfig>,
    node_id: RaftNodeId,
}

impl OpenRaftConsensus {
    /// Wrap an already-initialized `Raft` handle.
    pub fn new(raft: openraft::Raft<TypeConfig>, node_id: RaftNodeId) -> Self {
        Self { raft, node_id }
    }
}

#[async_trait]
impl ConsensusLog for OpenRaftConsensus {
    async fn propose(&self, op: MutationOp) -> Result<MutationOp> {
        let response = self
            .raft
            .client_write(op)
            .await
            .map_err(|e| Error::Unavailable(format!("raft client_write failed: {e}")))?;
        Ok(response.data)
    }

    fn is_leader(&self) -> bool {
        self.raft
            .current_leader_sync()
            .map(|leader| leader == self.node_id)
            .unwrap_or(false)
    }

    fn leader_hint(&self) -> Option<String> {
        self.raft.current_leader_sync().map(|id| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{NodeDescriptor, NodeId};

    #[tokio::test]
    async fn state_machine_applies_entries_in_order() {
        let mut sm = MemStateMachine::new(Topology::empty(), 1);
        let entry = Entry {
            log_id: LogId::new(openraft::CommittedLeaderId::new(1, 0), 1),
            payload: EntryPayload::Normal(MutationOp::RegisterNode {
                descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
            }),
        };
        let responses = sm.apply(vec![entry]).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(sm.topology().version, 1);
    }
}
