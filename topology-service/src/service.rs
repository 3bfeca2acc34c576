//! C3: the orchestration layer. Composes C1 (the ring, rebuilt from each
//! new committed snapshot) with a handle to C2, and exposes the read
//! operations and admin actions §4.3 names.

use crate::config::Config;
use crate::hotkeys::HotKeyTracker;
use crate::metrics::Metrics;
use hash_ring::HashRing;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use topology_store::{MutationOp, TopologyHandle};
use topology_types::{NodeId, Shard, ShardId, Topology, TopologyEvent};

use crate::Result;

/// The orchestration service: a ring derived from the latest snapshot plus
/// the handle needed to propose new mutations and read fresh ones.
pub struct TopologyService {
    handle: TopologyHandle,
    ring: Arc<RwLock<HashRing>>,
    hot_keys: Arc<HotKeyTracker>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl TopologyService {
    /// Construct the service and spawn the background task that rebuilds
    /// the ring whenever C2 commits a new version.
    pub fn new(handle: TopologyHandle, config: Config, metrics: Arc<Metrics>) -> Self {
        let ring = Arc::new(RwLock::new(build_ring(&handle.snapshot())));
        let hot_keys = Arc::new(HotKeyTracker::new(config.hot_keys));

        spawn_ring_rebuilder(handle.clone(), ring.clone());

        Self {
            handle,
            ring,
            hot_keys,
            config,
            metrics,
        }
    }

    /// `getTopologySnapshot()`.
    pub fn get_topology_snapshot(&self) -> Topology {
        self.handle.snapshot()
    }

    /// `getShardsForKey(key)`: the shard owning `key` and its current
    /// replica list, looked up in the locally-held ring rather than
    /// round-tripping to C2.
    pub fn get_shards_for_key(&self, key: &[u8]) -> Option<(ShardId, Vec<NodeId>)> {
        let timer = std::time::Instant::now();
        let topology = self.handle.snapshot();
        let shard = topology.shard_for_key(key)?;
        self.hot_keys
            .record(topology_types::hash64(key), shard.id, chrono::Utc::now().timestamp_millis());
        self.metrics
            .lookup_duration_seconds
            .observe(timer.elapsed().as_secs_f64());
        Some((shard.id, shard.replicas.clone()))
    }

    /// `getShardInfo(shardId)`.
    pub fn get_shard_info(&self, shard_id: ShardId) -> Option<Shard> {
        self.handle.snapshot().shards.get(&shard_id).cloned()
    }

    /// `manuallyTriggerHealthCheck(nodeId)` drives an out-of-band probe
    /// round covering every node; `node_id` is accepted for interface
    /// symmetry with the admin REST surface even though the underlying
    /// monitor currently probes the whole fleet each round.
    pub async fn manually_trigger_health_check(
        &self,
        health_monitor: &crate::health::HealthMonitor,
        _node_id: Option<NodeId>,
    ) {
        health_monitor.probe_all().await;
    }

    /// Refresh the `hotKeys` list on the committed topology by proposing no
    /// mutation — hot keys are advisory and held service-side, surfaced via
    /// `get_topology_snapshot` callers augmenting with
    /// `current_hot_keys()`.
    pub fn current_hot_keys(&self) -> Vec<topology_types::HotKey> {
        let hot = self.hot_keys.snapshot(chrono::Utc::now().timestamp_millis());
        self.metrics.set_hot_key_count(hot.len());
        hot
    }

    /// `subscribe()`: delegates straight to C2's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.handle.subscribe()
    }

    /// Start a migration (admin REST: `POST /topology/shards/{id}/migrate`).
    pub async fn start_migration(&self, shard_id: ShardId, target: NodeId) -> Result<Topology> {
        crate::migration::start(&self.handle, shard_id, target).await
    }

    /// Evaluate load signals and, if imbalanced, propose the resulting
    /// shard moves one at a time.
    pub async fn evaluate_rebalance(
        &self,
        loads: &std::collections::HashMap<NodeId, crate::rebalance::LoadSample>,
    ) -> Result<Vec<crate::rebalance::RebalanceMove>> {
        let topology = self.handle.snapshot();
        let moves = crate::rebalance::plan(&topology, loads, &self.config.rebalance);
        for mv in &moves {
            let shard = topology
                .shards
                .get(&mv.shard_id)
                .ok_or_else(|| topology_types::CoreError::NotFound(format!("shard {}", mv.shard_id)))?;
            let mut replicas = shard.replicas.clone();
            if let Some(pos) = replicas.iter().position(|r| r == &mv.to) {
                replicas.swap(0, pos);
            }
            self.handle
                .propose(MutationOp::ReassignShard {
                    shard_id: mv.shard_id,
                    primary: mv.to.clone(),
                    replicas,
                })
                .await?;
        }
        self.metrics.record_rebalance_plan(moves.len());
        Ok(moves)
    }
}

fn build_ring(topology: &Topology) -> HashRing {
    let mut ring = HashRing::new(hash_ring::DEFAULT_VIRTUAL_COUNT, hash_ring::DEFAULT_REPLICATION_FACTOR);
    for (node_id, record) in topology.nodes.iter() {
        ring.add_node(node_id.clone(), record.descriptor.weight);
    }
    ring
}

fn spawn_ring_rebuilder(handle: TopologyHandle, ring: Arc<RwLock<HashRing>>) {
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) if event.advances_version() => {
                    let topology = handle.snapshot();
                    *ring.write() = build_ring(&topology);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    let topology = handle.snapshot();
                    *ring.write() = build_ring(&topology);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology_store::consensus::StandaloneConsensus;
    use topology_types::{KeyRange, NodeDescriptor};

    #[tokio::test]
    async fn get_shards_for_key_reflects_committed_topology() {
        let handle = topology_store::spawn(
            Topology::empty(),
            1,
            Arc::new(StandaloneConsensus::new()),
            16,
            Arc::new(topology_store::Metrics::new().unwrap()),
        );
        handle
            .propose(MutationOp::RegisterNode {
                descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
            })
            .await
            .unwrap();
        handle
            .propose(MutationOp::CreateShard {
                id: ShardId::new(0),
                key_range: KeyRange { low: 0, high: u64::MAX },
                replicas: vec![NodeId::new("n1")],
            })
            .await
            .unwrap();

        let service = TopologyService::new(handle, Config::default(), Arc::new(Metrics::new().unwrap()));
        let (shard_id, replicas) = service.get_shards_for_key(b"hello").unwrap();
        assert_eq!(shard_id, ShardId::new(0));
        assert_eq!(replicas, vec![NodeId::new("n1")]);
    }
}
