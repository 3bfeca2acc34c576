//! Health probing and failover (§4.3).
//!
//! A `HealthMonitor` probes every registered node on a fixed interval,
//! updates its rolling health signal, and proposes `UpdateNodeHealth`
//! whenever the status changes. When a primary flips to `Failed`, it
//! additionally proposes `ReassignShard` for every shard that node led,
//! promoting the next `Healthy` replica.

use crate::config::HealthConfig;
use crate::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use topology_store::{MutationOp, TopologyHandle};
use topology_types::{HealthStatus, NodeHealth, NodeId};

/// Pluggable probe transport, so the monitor doesn't hardcode a protocol.
/// `concordkv-node` supplies the real implementation (TCP connect / gRPC
/// health check); tests use an in-memory stub.
#[async_trait::async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Probe `address`, returning the observed round-trip latency on
    /// success.
    async fn probe(&self, address: &str, timeout: Duration) -> Result<Duration, ()>;
}

/// Drives periodic health probing and the resulting failover mutations.
pub struct HealthMonitor {
    handle: TopologyHandle,
    transport: Arc<dyn ProbeTransport>,
    config: HealthConfig,
    metrics: Arc<Metrics>,
}

impl HealthMonitor {
    /// Construct a new monitor. Does not start probing until
    /// [`HealthMonitor::run`] is spawned.
    pub fn new(
        handle: TopologyHandle,
        transport: Arc<dyn ProbeTransport>,
        config: HealthConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            handle,
            transport,
            config,
            metrics,
        }
    }

    /// Run the probe loop forever. Intended to be spawned as a background
    /// task.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.probe_interval_secs));
        loop {
            interval.tick().await;
            self.probe_all().await;
        }
    }

    /// Probe every registered node once and apply any resulting health
    /// transitions. Exposed standalone so `manuallyTriggerHealthCheck` can
    /// drive an out-of-band round without waiting for the timer.
    pub async fn probe_all(&self) {
        let topology = self.handle.snapshot();
        for (node_id, record) in topology.nodes.iter() {
            let timeout = Duration::from_secs(self.config.probe_timeout_secs);
            let outcome = self.transport.probe(&record.descriptor.address, timeout).await;
            self.metrics.record_probe(outcome.is_ok());

            let mut health = record.health;
            let previous_status = health.status;
            health.last_probe_at_ms = chrono::Utc::now().timestamp_millis();

            match outcome {
                Ok(latency) => {
                    health.consecutive_failures = 0;
                    health.status = HealthStatus::Healthy;
                    health.rolling_latency_ms =
                        ewma(health.rolling_latency_ms, latency.as_secs_f64() * 1000.0);
                    health.rolling_success_rate = ewma(health.rolling_success_rate, 1.0);
                }
                Err(()) => {
                    health.consecutive_failures += 1;
                    health.rolling_success_rate = ewma(health.rolling_success_rate, 0.0);
                    health.status = self.next_status(previous_status, health.consecutive_failures);
                }
            }

            if health.status != previous_status || outcome.is_ok() {
                self.apply_health_update(node_id.clone(), health).await;
            }

            if previous_status != HealthStatus::Failed && health.status == HealthStatus::Failed {
                self.failover_node(node_id).await;
            }
        }
    }

    /// §4.3's two-stage degrade: HEALTHY → SUSPECT after
    /// `suspect_after_failures` consecutive misses, SUSPECT → FAILED after a
    /// further `failed_after_additional_cycles` cycles.
    fn next_status(&self, previous: HealthStatus, consecutive_failures: u32) -> HealthStatus {
        let failed_at = self.config.suspect_after_failures + self.config.failed_after_additional_cycles;
        if consecutive_failures >= failed_at {
            HealthStatus::Failed
        } else if consecutive_failures >= self.config.suspect_after_failures {
            HealthStatus::Suspect
        } else {
            previous
        }
    }

    async fn apply_health_update(&self, node_id: NodeId, health: NodeHealth) {
        if let Err(e) = self
            .handle
            .propose(MutationOp::UpdateNodeHealth { node_id: node_id.clone(), health })
            .await
        {
            tracing::warn!(node = %node_id, error = %e, "failed to propose health update");
        }
    }

    /// Reassign every shard `node_id` leads to its next healthy replica.
    async fn failover_node(&self, node_id: &NodeId) {
        let topology = self.handle.snapshot();
        for shard_id in topology.shards_led_by(node_id) {
            let Some(shard) = topology.shards.get(&shard_id) else { continue };
            let Some(new_primary) = topology_store::invariants::next_healthy_replica(&topology, shard_id) else {
                tracing::error!(shard = %shard_id, "no healthy replica available for failover");
                continue;
            };
            let mut replicas = shard.replicas.clone();
            replicas.retain(|r| r != node_id);
            if let Some(pos) = replicas.iter().position(|r| r == &new_primary) {
                replicas.swap(0, pos);
            } else {
                replicas.insert(0, new_primary.clone());
            }

            let result = self
                .handle
                .propose(MutationOp::ReassignShard {
                    shard_id,
                    primary: new_primary.clone(),
                    replicas,
                })
                .await;
            match result {
                Ok(_) => {
                    self.metrics.record_failover();
                    tracing::info!(shard = %shard_id, new_primary = %new_primary, "failed over shard primary");
                }
                Err(e) => tracing::error!(shard = %shard_id, error = %e, "failover reassignment rejected"),
            }
        }
    }
}

fn ewma(previous: f64, sample: f64) -> f64 {
    const ALPHA: f64 = 0.3;
    ALPHA * sample + (1.0 - ALPHA) * previous
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use topology_store::{consensus::StandaloneConsensus, Metrics as StoreMetrics};
    use topology_types::{KeyRange, NodeDescriptor, ShardId, Topology};

    struct AlwaysFails;
    #[async_trait]
    impl ProbeTransport for AlwaysFails {
        async fn probe(&self, _address: &str, _timeout: Duration) -> Result<Duration, ()> {
            Err(())
        }
    }

    struct Flaky(AtomicBool);
    #[async_trait]
    impl ProbeTransport for Flaky {
        async fn probe(&self, _address: &str, _timeout: Duration) -> Result<Duration, ()> {
            if self.0.swap(true, Ordering::SeqCst) {
                Ok(Duration::from_millis(5))
            } else {
                Err(())
            }
        }
    }

    async fn handle_with_node() -> (TopologyHandle, NodeId) {
        let mut topology = Topology::empty();
        topology.nodes.insert(
            NodeId::new("n1"),
            topology_types::NodeRecord::new(NodeDescriptor::new(NodeId::new("n1"), "a:1")),
        );
        topology.nodes.insert(
            NodeId::new("n2"),
            topology_types::NodeRecord::new(NodeDescriptor::new(NodeId::new("n2"), "a:2")),
        );
        topology.shards.insert(
            ShardId::new(0),
            topology_types::Shard::bootstrap(
                ShardId::new(0),
                KeyRange { low: 0, high: u64::MAX },
                vec![NodeId::new("n1"), NodeId::new("n2")],
            ),
        );
        let handle = topology_store::spawn(
            topology,
            1,
            Arc::new(StandaloneConsensus::new()),
            16,
            Arc::new(StoreMetrics::new().unwrap()),
        );
        (handle, NodeId::new("n1"))
    }

    #[tokio::test]
    async fn repeated_failures_escalate_to_failed_and_trigger_failover() {
        let (handle, primary) = handle_with_node().await;
        let monitor = HealthMonitor::new(
            handle.clone(),
            Arc::new(AlwaysFails),
            HealthConfig {
                probe_interval_secs: 3600,
                probe_timeout_secs: 1,
                suspect_after_failures: 2,
                failed_after_additional_cycles: 1,
            },
            Arc::new(Metrics::new().unwrap()),
        );

        for _ in 0..3 {
            monitor.probe_all().await;
        }

        let topology = handle.snapshot();
        assert_eq!(topology.nodes[&primary].health.status, HealthStatus::Failed);
        let shard = &topology.shards[&ShardId::new(0)];
        assert_ne!(shard.primary, primary);
    }

    #[tokio::test]
    async fn recovery_resets_to_healthy() {
        let (handle, node) = handle_with_node().await;
        let monitor = HealthMonitor::new(
            handle.clone(),
            Arc::new(Flaky(AtomicBool::new(false))),
            HealthConfig::default(),
            Arc::new(Metrics::new().unwrap()),
        );

        monitor.probe_all().await;
        monitor.probe_all().await;

        let topology = handle.snapshot();
        assert_eq!(topology.nodes[&node].health.status, HealthStatus::Healthy);
    }
}
