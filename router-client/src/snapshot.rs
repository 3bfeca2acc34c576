//! `LocalTopology`, C5's `{version, shards, nodes, ring}` replica (§4.5).
//!
//! Held behind `arc-swap::ArcSwap` rather than the teacher's usual
//! `parking_lot::RwLock`: §5 requires "C5's snapshot is held behind an
//! atomic pointer swap; readers never block writers", which a read/write
//! lock cannot give — a writer rebuilding the ring would still stall
//! concurrent readers for the duration of the swap.

use std::sync::Arc;

use arc_swap::ArcSwap;
use hash_ring::HashRing;
use topology_types::{EventKind, EventPayload, NodeId, Topology, TopologyEvent};

/// One consistent view: a topology snapshot and the ring rebuilt from it,
/// always swapped in together so a reader never sees a ring that
/// disagrees with the topology it was built from.
#[derive(Debug, Clone)]
pub struct View {
    /// The cached topology.
    pub topology: Topology,
    /// The ring rebuilt from `topology.nodes`.
    pub ring: Arc<HashRing>,
}

fn build_ring(topology: &Topology) -> HashRing {
    let mut ring = HashRing::new(hash_ring::DEFAULT_VIRTUAL_COUNT, hash_ring::DEFAULT_REPLICATION_FACTOR);
    for (node_id, record) in topology.nodes.iter() {
        ring.add_node(node_id.clone(), record.descriptor.weight);
    }
    ring
}

/// The client-side topology cache.
pub struct LocalTopology {
    view: ArcSwap<View>,
}

impl LocalTopology {
    /// Seed the cache from an initial `FULL_SNAPSHOT`, per §4.5 ("Clients
    /// subscribe to C4 at startup; initial state is a FULL_SNAPSHOT").
    pub fn new(initial: Topology) -> Self {
        let ring = Arc::new(build_ring(&initial));
        Self {
            view: ArcSwap::from_pointee(View { topology: initial, ring }),
        }
    }

    /// The version of the currently cached topology.
    pub fn version(&self) -> u64 {
        self.view.load().topology.version
    }

    /// Atomically load the current view. Cheap: an `Arc` clone, not a
    /// deep copy — per §5, in-flight requests keep using the view they
    /// already loaded even if a newer one is published mid-flight.
    pub fn current(&self) -> Arc<View> {
        self.view.load_full()
    }

    /// Replace the cached topology outright, rebuilding the ring
    /// alongside it.
    pub fn replace(&self, topology: Topology) {
        let ring = Arc::new(build_ring(&topology));
        self.view.store(Arc::new(View { topology, ring }));
    }

    /// Fold a committed event into the cache. Returns `false` if the
    /// event was stale (`to_version` at or below the cached version) and
    /// was discarded, per the at-least-once/duplicate-tolerant delivery
    /// guarantee ("clients MUST tolerate duplicates").
    pub fn apply_event(&self, event: &TopologyEvent) -> bool {
        if let (EventKind::FullSnapshot, EventPayload::Snapshot(topology)) = (event.kind, &event.payload) {
            self.replace((**topology).clone());
            return true;
        }
        if !event.advances_version() {
            return false;
        }

        let current = self.current();
        if event.to_version <= current.topology.version {
            return false;
        }

        let mut next = current.topology.clone();
        next.version = event.to_version;
        match &event.payload {
            EventPayload::Shard(shard) => {
                next.shards.insert(shard.id, (**shard).clone());
            }
            EventPayload::NodeJoined(record) => {
                next.nodes.insert(record.descriptor.id.clone(), (**record).clone());
            }
            EventPayload::Node(node_id) if event.kind == EventKind::NodeRemoved => {
                next.nodes.remove(node_id);
            }
            EventPayload::NodeHealth(node_id, health) => {
                if let Some(record) = next.nodes.get_mut(node_id) {
                    record.health = *health;
                }
            }
            _ => {}
        }
        self.replace(next);
        true
    }

    /// Resolve `key` directly via the ring, bypassing the shard map — the
    /// `CONSISTENT_HASH` policy's escape hatch for key-level affinity
    /// across shard boundaries (e.g. session pinning).
    pub fn ring_owner(&self, key: &[u8]) -> Option<NodeId> {
        self.current().ring.replicas_for(key).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_types::{KeyRange, NodeDescriptor, NodeRecord, Shard, ShardId};

    fn node(id: &str) -> NodeRecord {
        NodeRecord::new(NodeDescriptor::new(NodeId::new(id), format!("{id}:1")))
    }

    #[test]
    fn full_snapshot_replaces_wholesale() {
        let mut base = Topology::empty();
        base.nodes.insert(NodeId::new("n1"), node("n1"));
        let cache = LocalTopology::new(base);
        assert_eq!(cache.version(), 0);

        let mut replacement = Topology::empty();
        replacement.version = 5;
        let event = TopologyEvent::full_snapshot(replacement, 0);
        assert!(cache.apply_event(&event));
        assert_eq!(cache.version(), 5);
    }

    #[test]
    fn node_joined_delta_adds_the_full_record() {
        let cache = LocalTopology::new(Topology::empty());
        let record = node("n1");
        let event = TopologyEvent {
            from_version: 0,
            to_version: 1,
            kind: EventKind::NodeAdded,
            payload: EventPayload::NodeJoined(Box::new(record)),
            timestamp_ms: 0,
        };
        assert!(cache.apply_event(&event));
        assert!(cache.current().topology.nodes.contains_key(&NodeId::new("n1")));
    }

    #[test]
    fn stale_delta_is_discarded() {
        let mut base = Topology::empty();
        base.version = 10;
        let cache = LocalTopology::new(base);
        let event = TopologyEvent {
            from_version: 3,
            to_version: 4,
            kind: EventKind::NodeHealthChanged,
            payload: EventPayload::None,
            timestamp_ms: 0,
        };
        assert!(!cache.apply_event(&event));
        assert_eq!(cache.version(), 10);
    }

    #[test]
    fn shard_update_delta_is_applied_in_place() {
        let cache = LocalTopology::new(Topology::empty());
        let shard = Shard::bootstrap(
            ShardId::new(0),
            KeyRange { low: 0, high: u64::MAX },
            vec![NodeId::new("n1")],
        );
        let event = TopologyEvent {
            from_version: 0,
            to_version: 1,
            kind: EventKind::ShardUpdated,
            payload: EventPayload::Shard(Box::new(shard)),
            timestamp_ms: 0,
        };
        assert!(cache.apply_event(&event));
        assert!(cache.current().topology.shards.contains_key(&ShardId::new(0)));
    }
}
