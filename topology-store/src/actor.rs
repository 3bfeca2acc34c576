//! Single-writer actor for the topology state machine.
//!
//! Grounded on the teacher's `LedgerActor`/`LedgerHandle` mailbox pattern:
//! one task owns the authoritative `Topology` and serializes all mutation
//! proposals through an mpsc mailbox with oneshot response channels, so
//! there is never more than one in-flight `apply`. Unlike the teacher's
//! actor there is no batching timer — mutations here are infrequent
//! membership/shard changes, not a high-throughput event stream, so each
//! proposal is applied as soon as it is received.

use crate::consensus::ConsensusLog;
use crate::metrics::Metrics;
use crate::mutations::{self, MutationOp};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use topology_types::{EventKind, EventPayload, Topology, TopologyEvent};

/// Messages accepted by the [`TopologyActor`] mailbox.
enum Message {
    Propose {
        op: MutationOp,
        response: oneshot::Sender<Result<Topology>>,
    },
    Snapshot {
        response: oneshot::Sender<Topology>,
    },
}

/// Owns the authoritative `Topology` and applies committed mutations to it
/// one at a time.
pub struct TopologyActor {
    topology: Topology,
    shard_count: u16,
    consensus: Arc<dyn ConsensusLog>,
    mailbox: mpsc::Receiver<Message>,
    events: broadcast::Sender<TopologyEvent>,
    snapshot_tx: watch::Sender<Topology>,
    metrics: Arc<Metrics>,
}

impl TopologyActor {
    fn new(
        initial: Topology,
        shard_count: u16,
        consensus: Arc<dyn ConsensusLog>,
        mailbox: mpsc::Receiver<Message>,
        events: broadcast::Sender<TopologyEvent>,
        snapshot_tx: watch::Sender<Topology>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            topology: initial,
            shard_count,
            consensus,
            mailbox,
            events,
            snapshot_tx,
            metrics,
        }
    }

    async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                Message::Propose { op, response } => {
                    let result = self.handle_propose(op).await;
                    let _ = response.send(result);
                }
                Message::Snapshot { response } => {
                    let _ = response.send(self.topology.clone());
                }
            }
        }
        tracing::info!("topology actor mailbox closed, shutting down");
    }

    async fn handle_propose(&mut self, op: MutationOp) -> Result<Topology> {
        if !self.consensus.is_leader() {
            return Err(Error::NotLeader {
                leader_hint: self.consensus.leader_hint(),
            });
        }

        let timer = std::time::Instant::now();
        let kind = op.kind_label();

        let committed_op = self.consensus.propose(op).await?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        let from_version = self.topology.version;

        let next = mutations::apply(&self.topology, &committed_op, self.shard_count, now_ms)?;
        self.topology = next.clone();

        self.metrics.record_mutation(kind, timer.elapsed().as_secs_f64());
        self.metrics.set_version(next.version);

        let event = build_event(from_version, &next, &committed_op, now_ms);
        // A lagging or absent subscriber must never block the writer: the
        // change notifier re-synchronizes stragglers with a full snapshot.
        let _ = self.events.send(event);
        let _ = self.snapshot_tx.send(next.clone());

        Ok(next)
    }
}

/// Translate a committed mutation into the `TopologyEvent` subscribers see.
/// Lives here rather than on `TopologyEvent` itself: `MutationOp` is a
/// `topology-store` concept, and `topology-types` must stay ignorant of it
/// to avoid a dependency cycle.
fn build_event(from_version: u64, next: &Topology, op: &MutationOp, now_ms: i64) -> TopologyEvent {
    let to_version = next.version;
    let (kind, payload) = match op {
        MutationOp::CreateShard { id, .. } | MutationOp::ReassignShard { shard_id: id, .. } => (
            EventKind::ShardUpdated,
            next.shards
                .get(id)
                .map(|s| EventPayload::Shard(Box::new(s.clone())))
                .unwrap_or(EventPayload::None),
        ),
        MutationOp::StartMigration { shard_id, .. } => (
            EventKind::MigrationStarted,
            next.shards
                .get(shard_id)
                .map(|s| EventPayload::Shard(Box::new(s.clone())))
                .unwrap_or(EventPayload::None),
        ),
        MutationOp::UpdateMigrationProgress { shard_id, .. } => (
            EventKind::ShardUpdated,
            next.shards
                .get(shard_id)
                .map(|s| EventPayload::Shard(Box::new(s.clone())))
                .unwrap_or(EventPayload::None),
        ),
        MutationOp::CompleteMigration { shard_id } => (
            EventKind::MigrationCompleted,
            next.shards
                .get(shard_id)
                .map(|s| EventPayload::Shard(Box::new(s.clone())))
                .unwrap_or(EventPayload::None),
        ),
        MutationOp::RegisterNode { descriptor } => (
            EventKind::NodeAdded,
            next.nodes
                .get(&descriptor.id)
                .map(|record| EventPayload::NodeJoined(Box::new(record.clone())))
                .unwrap_or(EventPayload::None),
        ),
        MutationOp::DeregisterNode { node_id } => {
            (EventKind::NodeRemoved, EventPayload::Node(node_id.clone()))
        }
        MutationOp::UpdateNodeHealth { node_id, health } => (
            EventKind::NodeHealthChanged,
            EventPayload::NodeHealth(node_id.clone(), *health),
        ),
    };
    TopologyEvent {
        from_version,
        to_version,
        kind,
        payload,
        timestamp_ms: now_ms,
    }
}

/// Clonable handle to a running [`TopologyActor`].
#[derive(Clone)]
pub struct TopologyHandle {
    sender: mpsc::Sender<Message>,
    events: broadcast::Sender<TopologyEvent>,
    snapshot_rx: watch::Receiver<Topology>,
}

impl TopologyHandle {
    /// Propose a mutation and wait for it to be committed and applied.
    pub async fn propose(&self, op: MutationOp) -> Result<Topology> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Propose { op, response: tx })
            .await
            .map_err(|_| Error::Unavailable("topology actor mailbox closed".into()))?;
        rx.await
            .map_err(|_| Error::Unavailable("topology actor response channel closed".into()))?
    }

    /// Return the current committed topology without going through the
    /// mailbox round-trip (served from the `watch` channel, always one
    /// version behind at most).
    pub fn snapshot(&self) -> Topology {
        self.snapshot_rx.borrow().clone()
    }

    /// Request a fresh snapshot through the mailbox, guaranteed to reflect
    /// every proposal accepted before this call returns.
    pub async fn snapshot_linearized(&self) -> Result<Topology> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(Message::Snapshot { response: tx })
            .await
            .map_err(|_| Error::Unavailable("topology actor mailbox closed".into()))?;
        rx.await
            .map_err(|_| Error::Unavailable("topology actor response channel closed".into()))
    }

    /// Subscribe to the event stream of committed mutations. New
    /// subscribers do not receive history; callers needing a starting point
    /// should call [`TopologyHandle::snapshot`] first.
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.events.subscribe()
    }
}

/// Spawn a [`TopologyActor`] and return a handle to it.
pub fn spawn(
    initial: Topology,
    shard_count: u16,
    consensus: Arc<dyn ConsensusLog>,
    event_buffer_capacity: usize,
    metrics: Arc<Metrics>,
) -> TopologyHandle {
    let (tx, rx) = mpsc::channel(256);
    let (events_tx, _) = broadcast::channel(event_buffer_capacity);
    let (snapshot_tx, snapshot_rx) = watch::channel(initial.clone());

    let actor = TopologyActor::new(
        initial,
        shard_count,
        consensus,
        rx,
        events_tx.clone(),
        snapshot_tx,
        metrics,
    );
    tokio::spawn(actor.run());

    TopologyHandle {
        sender: tx,
        events: events_tx,
        snapshot_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::StandaloneConsensus;
    use topology_types::{KeyRange, NodeDescriptor, NodeId, ShardId};

    fn test_metrics() -> Arc<Metrics> {
        Arc::new(Metrics::new().unwrap())
    }

    #[tokio::test]
    async fn propose_applies_and_bumps_version() {
        let handle = spawn(
            Topology::empty(),
            1,
            Arc::new(StandaloneConsensus::new()),
            16,
            test_metrics(),
        );

        let topology = handle
            .propose(MutationOp::RegisterNode {
                descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
            })
            .await
            .unwrap();
        assert_eq!(topology.version, 1);
        assert_eq!(handle.snapshot().version, 1);
    }

    #[tokio::test]
    async fn subscribers_receive_committed_events() {
        let handle = spawn(
            Topology::empty(),
            1,
            Arc::new(StandaloneConsensus::new()),
            16,
            test_metrics(),
        );
        let mut rx = handle.subscribe();

        handle
            .propose(MutationOp::RegisterNode {
                descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
            })
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.to_version, 1);
    }

    #[tokio::test]
    async fn invalid_mutation_does_not_bump_version() {
        let handle = spawn(
            Topology::empty(),
            1,
            Arc::new(StandaloneConsensus::new()),
            16,
            test_metrics(),
        );

        let err = handle
            .propose(MutationOp::DeregisterNode {
                node_id: NodeId::new("missing"),
            })
            .await;
        assert!(err.is_err());
        assert_eq!(handle.snapshot().version, 0);
        let _ = ShardId::new(0);
        let _ = KeyRange { low: 0, high: u64::MAX };
    }
}
