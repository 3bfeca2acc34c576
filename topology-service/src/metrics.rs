//! Prometheus metrics for the topology service.

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge, Registry,
};
use std::sync::Arc;

/// C3's metrics collector.
#[derive(Clone)]
pub struct Metrics {
    /// Count of health probes, labeled `outcome="ok"|"failed"`.
    pub probes_total: IntCounterVec,
    /// Count of primary failovers triggered.
    pub failovers_total: IntCounter,
    /// Count of rebalance plans produced.
    pub rebalance_plans_total: IntCounter,
    /// Count of shard moves issued by rebalance plans.
    pub rebalance_moves_total: IntCounter,
    /// Current number of keys flagged hot.
    pub hot_keys_gauge: IntGauge,
    /// Latency of `getShardsForKey` lookups.
    pub lookup_duration_seconds: Histogram,
    /// Registry these metrics are registered against.
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Construct and register a fresh metrics set.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let probes_total = register_int_counter_vec!(
            "topology_service_probes_total",
            "Total health probes performed",
            &["outcome"]
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let failovers_total = register_int_counter!(
            "topology_service_failovers_total",
            "Total primary failovers triggered by health monitoring"
        )?;
        registry.register(Box::new(failovers_total.clone()))?;

        let rebalance_plans_total = register_int_counter!(
            "topology_service_rebalance_plans_total",
            "Total rebalance plans produced"
        )?;
        registry.register(Box::new(rebalance_plans_total.clone()))?;

        let rebalance_moves_total = register_int_counter!(
            "topology_service_rebalance_moves_total",
            "Total shard moves issued across all rebalance plans"
        )?;
        registry.register(Box::new(rebalance_moves_total.clone()))?;

        let hot_keys_gauge = register_int_gauge!(
            "topology_service_hot_keys",
            "Current number of keys flagged as hot"
        )?;
        registry.register(Box::new(hot_keys_gauge.clone()))?;

        let lookup_duration_seconds = register_histogram!(
            "topology_service_lookup_duration_seconds",
            "Latency of shard-for-key lookups",
            vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]
        )?;
        registry.register(Box::new(lookup_duration_seconds.clone()))?;

        Ok(Self {
            probes_total,
            failovers_total,
            rebalance_plans_total,
            rebalance_moves_total,
            hot_keys_gauge,
            lookup_duration_seconds,
            registry,
        })
    }

    /// Record a probe outcome.
    pub fn record_probe(&self, ok: bool) {
        let label = if ok { "ok" } else { "failed" };
        self.probes_total.with_label_values(&[label]).inc();
    }

    /// Record a failover.
    pub fn record_failover(&self) {
        self.failovers_total.inc();
    }

    /// Record a rebalance plan with `moves` shard moves.
    pub fn record_rebalance_plan(&self, moves: usize) {
        self.rebalance_plans_total.inc();
        self.rebalance_moves_total.inc_by(moves as u64);
    }

    /// Update the current hot-key count.
    pub fn set_hot_key_count(&self, count: usize) {
        self.hot_keys_gauge.set(count as i64);
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to register topology-service metrics")
    }
}
