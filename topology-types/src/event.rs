//! The versioned change-event stream C2 emits and C4 fans out.

use crate::node::{NodeHealth, NodeId, NodeRecord};
use crate::shard::{Shard, ShardId};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};

/// The kind of change a `TopologyEvent` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// A full topology replacement, sent to subscribers who are too far
    /// behind for incremental deltas to apply.
    FullSnapshot,
    /// A single shard's assignment or state changed.
    ShardUpdated,
    /// A node was registered.
    NodeAdded,
    /// A node was deregistered.
    NodeRemoved,
    /// A node's health status transitioned.
    NodeHealthChanged,
    /// A migration began for a shard.
    MigrationStarted,
    /// A migration finished for a shard.
    MigrationCompleted,
    /// Transport-level keep-alive; never changes `version`. Not part of the
    /// §3 `TopologyEvent.kind` enum because it carries no topology change,
    /// but framed identically (§4.4 / §6) so subscribers can treat it
    /// uniformly.
    Heartbeat,
}

/// The payload carried alongside an `EventKind`. Each variant lines up with
/// exactly one `EventKind` except `Heartbeat`, which carries `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// Full topology, for `FullSnapshot`.
    Snapshot(Box<Topology>),
    /// Updated shard record, for `ShardUpdated`, `MigrationStarted`,
    /// `MigrationCompleted`.
    Shard(Box<Shard>),
    /// Removed node id, for `NodeRemoved`. (`NodeAdded` carries the full
    /// record via `NodeJoined` since subscribers cannot reconstruct a
    /// descriptor from an id alone.)
    Node(NodeId),
    /// Full node record, for `NodeAdded`.
    NodeJoined(Box<NodeRecord>),
    /// Node id plus its new health, for `NodeHealthChanged`.
    NodeHealth(NodeId, NodeHealth),
    /// No payload (heartbeats).
    None,
}

/// One entry in the topology change stream.
///
/// Invariant (§3): for a given subscriber, `events[i].to_version ==
/// events[i+1].from_version` and versions strictly increase — i.e. the
/// stream is gapless from the subscriber's point of view. A subscriber that
/// cannot be kept gapless (buffer overflow, retention expiry) is instead
/// resynchronized with a `FullSnapshot` event, whose `from_version` is
/// meaningless and is set equal to `to_version - 1` purely so the framing
/// struct always has both fields populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyEvent {
    /// Version immediately prior to this event.
    pub from_version: u64,
    /// Version this event establishes.
    pub to_version: u64,
    /// What kind of change this is.
    pub kind: EventKind,
    /// The change payload.
    pub payload: EventPayload,
    /// Unix-epoch milliseconds the event was produced, written to the wire
    /// as `timestamp`.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
}

impl TopologyEvent {
    /// Build a `FullSnapshot` event for the given topology.
    pub fn full_snapshot(topology: Topology, timestamp_ms: i64) -> Self {
        let to_version = topology.version;
        Self {
            from_version: to_version.saturating_sub(1),
            to_version,
            kind: EventKind::FullSnapshot,
            payload: EventPayload::Snapshot(Box::new(topology)),
            timestamp_ms,
        }
    }

    /// Build a heartbeat event. `version` is the subscriber's current
    /// version (heartbeats never change it).
    pub fn heartbeat(version: u64, timestamp_ms: i64) -> Self {
        Self {
            from_version: version,
            to_version: version,
            kind: EventKind::Heartbeat,
            payload: EventPayload::None,
            timestamp_ms,
        }
    }

    /// Whether this event actually advances the version (false only for
    /// heartbeats).
    pub fn advances_version(&self) -> bool {
        !matches!(self.kind, EventKind::Heartbeat)
    }
}
