//! `Router`: the request-routing façade (§4.5). Chooses a target node
//! under the configured policy, retries with exponential backoff and
//! jitter on failure, backs off on `StaleTopology` to give the
//! concurrently-running subscription task (see `subscription::run`) a
//! chance to deliver a fresher snapshot before the next attempt, and
//! fast-fails writes against a fenced shard.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use dashmap::DashMap;

use topology_types::{CoreError, NodeId, Result, Shard, ShardId, ShardState};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::policy::{choose_replica, ReadPolicy};
use crate::snapshot::LocalTopology;

/// Whether a call is a read or a write. Writes always target the
/// primary regardless of the configured read policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Read request; uses the configured or overridden read policy.
    Read,
    /// Write request; always targets the primary.
    Write,
}

/// This router's locally-observed view of a node, independent of C2's
/// authoritative health monitor — a few consecutive failures here mark a
/// node `Suspect` for *this client's* routing decisions well before the
/// server-side health monitor would escalate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalHealth {
    Healthy,
    Suspect,
}

/// The outcome of a single routing decision.
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    /// The shard `key` belongs to.
    pub shard_id: ShardId,
    /// The chosen target node.
    pub node: NodeId,
    /// Set when a write landed on a shard mid-migration: the caller
    /// should attach this as the known source shard so the server can
    /// double-write if its protocol requires that.
    pub migration_source: Option<ShardId>,
}

/// Routes key-addressed requests against the cached topology, retrying
/// across replica candidates on failure.
pub struct Router {
    snapshot: Arc<LocalTopology>,
    config: Config,
    metrics: Arc<Metrics>,
    round_robin: DashMap<ShardId, AtomicUsize>,
    latencies: DashMap<NodeId, f64>,
    loads: DashMap<NodeId, f64>,
    node_health: DashMap<NodeId, LocalHealth>,
}

impl Router {
    /// Build a router over an already-populated local topology cache.
    pub fn new(snapshot: Arc<LocalTopology>, config: Config, metrics: Arc<Metrics>) -> Self {
        Self {
            snapshot,
            config,
            metrics,
            round_robin: DashMap::new(),
            latencies: DashMap::new(),
            loads: DashMap::new(),
            node_health: DashMap::new(),
        }
    }

    /// Decide a single target node for `key` under `op`, honoring the
    /// shard's current lifecycle state (fencing writes against
    /// `ReadOnly`, rerouting `Migrating` writes to the current primary).
    pub fn route(&self, key: &[u8], op: Operation, read_policy: Option<ReadPolicy>) -> Result<RoutingDecision> {
        let view = self.snapshot.current();
        let shard = view
            .topology
            .shard_for_key(key)
            .ok_or_else(|| CoreError::NotFound(format!("no shard for key of length {}", key.len())))?;

        if op == Operation::Write {
            match shard.state {
                ShardState::ReadOnly => return Err(CoreError::ShardReadOnly(shard.id.as_u16())),
                ShardState::Migrating => {
                    return Ok(RoutingDecision {
                        shard_id: shard.id,
                        node: shard.primary.clone(),
                        migration_source: Some(shard.id),
                    });
                }
                ShardState::Offline => return Err(CoreError::Unavailable(format!("shard {} is offline", shard.id))),
                ShardState::Active => {}
            }
        }

        let policy = match op {
            Operation::Write => ReadPolicy::Primary,
            Operation::Read => read_policy.unwrap_or(self.config.default_read_policy),
        };
        let node = self.pick_healthy(shard, policy);

        Ok(RoutingDecision {
            shard_id: shard.id,
            node,
            migration_source: None,
        })
    }

    /// `CONSISTENT_HASH`: bypass the shard map entirely, routing `key`
    /// straight through the ring for key-level affinity across shards.
    pub fn route_consistent_hash(&self, key: &[u8]) -> Result<NodeId> {
        self.snapshot
            .ring_owner(key)
            .ok_or_else(|| CoreError::Unavailable("ring has no nodes".into()))
    }

    fn pick_healthy(&self, shard: &Shard, policy: ReadPolicy) -> NodeId {
        let cursor = self.round_robin.entry(shard.id).or_insert_with(|| AtomicUsize::new(0));
        let preferred = choose_replica(policy, shard, &cursor, &self.latencies, &self.loads);
        if !matches!(self.node_health.get(&preferred).map(|h| *h), Some(LocalHealth::Suspect)) {
            return preferred;
        }
        shard
            .replicas
            .iter()
            .find(|n| !matches!(self.node_health.get(*n).map(|h| *h), Some(LocalHealth::Suspect)))
            .cloned()
            .unwrap_or(preferred)
    }

    /// Execute `op` against successive candidates with exponential
    /// backoff, up to `retry_count` additional attempts. `attempt` issues
    /// the actual call for a routing decision; its errors drive retry and
    /// health-marking per §4.5. `StaleTopology` does not trigger a
    /// synchronous refresh — this crate has no admin-RPC client of its
    /// own — it backs off and re-routes against whatever the background
    /// subscription task (fed by the change notifier's event stream) has
    /// applied to the local snapshot by then, which may still be the same
    /// stale view if no new event has arrived.
    pub async fn execute<T, Fut>(
        &self,
        key: &[u8],
        op: Operation,
        read_policy: Option<ReadPolicy>,
        mut attempt: impl FnMut(RoutingDecision) -> Fut,
    ) -> Result<T>
    where
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut backoff = self.new_backoff();
        let mut last_err: Option<CoreError> = None;

        for _ in 0..=self.config.retry_count {
            let decision = self.route(key, op, read_policy)?;
            let node = decision.node.clone();
            match attempt(decision).await {
                Ok(value) => {
                    self.node_health.insert(node, LocalHealth::Healthy);
                    self.metrics.record_success();
                    return Ok(value);
                }
                Err(CoreError::StaleTopology { client_version, required_version }) => {
                    self.metrics.record_stale_refresh();
                    last_err = Some(CoreError::StaleTopology { client_version, required_version });
                }
                Err(err @ (CoreError::NotLeader { .. } | CoreError::NodeUnreachable(_) | CoreError::Timeout(_))) => {
                    self.node_health.insert(node, LocalHealth::Suspect);
                    self.metrics.record_retry();
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }

            if let Some(delay) = backoff.next_backoff() {
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_err.unwrap_or(CoreError::Unavailable("retry budget exhausted".into())))
    }

    fn new_backoff(&self) -> backoff::ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.backoff_base_ms))
            .with_multiplier(self.config.backoff_multiplier)
            .with_randomization_factor(self.config.backoff_jitter)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Record an observed latency sample for `node`, feeding the
    /// `NEAREST` policy's EWMA.
    pub fn record_latency(&self, node: &NodeId, sample_ms: f64) {
        let alpha = self.config.latency_ewma_alpha;
        self.latencies
            .entry(node.clone())
            .and_modify(|v| *v = alpha * sample_ms + (1.0 - alpha) * *v)
            .or_insert(sample_ms);
    }

    /// Record a load score observed for `node`, feeding `LOAD_BALANCED`.
    pub fn record_load(&self, node: &NodeId, score: f64) {
        self.loads.insert(node.clone(), score);
    }

    /// Reset a node back to `Healthy` in this router's local view, e.g.
    /// after the application observes a clean response out-of-band.
    pub fn mark_healthy(&self, node: &NodeId) {
        self.node_health.insert(node.clone(), LocalHealth::Healthy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use topology_types::{KeyRange, NodeDescriptor, NodeRecord, ShardId, Topology};

    fn topology_with_shard(state: ShardState) -> Topology {
        let mut topology = Topology::empty();
        topology
            .nodes
            .insert(NodeId::new("n1"), NodeRecord::new(NodeDescriptor::new(NodeId::new("n1"), "a:1")));
        topology
            .nodes
            .insert(NodeId::new("n2"), NodeRecord::new(NodeDescriptor::new(NodeId::new("n2"), "a:2")));
        let mut shard = Shard::bootstrap(
            ShardId::new(0),
            KeyRange { low: 0, high: u64::MAX },
            vec![NodeId::new("n1"), NodeId::new("n2")],
        );
        shard.state = state;
        if matches!(state, ShardState::Migrating | ShardState::ReadOnly) {
            shard.migration_target = Some(NodeId::new("n2"));
        }
        topology.shards.insert(shard.id, shard);
        topology
    }

    fn router(state: ShardState) -> Router {
        let snapshot = Arc::new(LocalTopology::new(topology_with_shard(state)));
        Router::new(snapshot, Config::default(), Arc::new(Metrics::new().unwrap()))
    }

    #[test]
    fn write_to_read_only_shard_fails_fast() {
        let r = router(ShardState::ReadOnly);
        let err = r.route(b"key", Operation::Write, None).unwrap_err();
        assert!(matches!(err, CoreError::ShardReadOnly(_)));
    }

    #[test]
    fn write_to_migrating_shard_targets_primary_with_source() {
        let r = router(ShardState::Migrating);
        let decision = r.route(b"key", Operation::Write, None).unwrap();
        assert_eq!(decision.node, NodeId::new("n1"));
        assert_eq!(decision.migration_source, Some(ShardId::new(0)));
    }

    #[test]
    fn read_honors_overridden_policy() {
        let r = router(ShardState::Active);
        let decision = r.route(b"key", Operation::Read, Some(ReadPolicy::Primary)).unwrap();
        assert_eq!(decision.node, NodeId::new("n1"));
    }

    #[tokio::test]
    async fn execute_retries_after_node_unreachable_then_succeeds() {
        let r = router(ShardState::Active);
        let calls = Cell::new(0);
        let result = r
            .execute(b"key", Operation::Read, Some(ReadPolicy::Primary), |_decision| {
                let n = calls.get();
                calls.set(n + 1);
                async move {
                    if n == 0 {
                        Err(CoreError::NodeUnreachable("n1".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn execute_surfaces_invalid_argument_without_retrying() {
        let r = router(ShardState::Active);
        let calls = Cell::new(0);
        let result = r
            .execute(b"key", Operation::Read, Some(ReadPolicy::Primary), |_decision| {
                calls.set(calls.get() + 1);
                async move { Err::<i32, _>(CoreError::InvalidArgument("bad".into())) }
            })
            .await;
        assert!(matches!(result, Err(CoreError::InvalidArgument(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn consistent_hash_bypasses_the_shard_map() {
        let r = router(ShardState::Active);
        let node = r.route_consistent_hash(b"session:abc").unwrap();
        assert!(node == NodeId::new("n1") || node == NodeId::new("n2"));
    }
}
