//! Prometheus metrics for the topology store.

use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, Registry,
};
use std::sync::Arc;

/// C2's metrics collector.
#[derive(Clone)]
pub struct Metrics {
    /// Count of committed mutations, labeled by `kind_label()`.
    pub mutations_total: IntCounterVec,
    /// Count of mutations rejected by invariant or validation checks,
    /// labeled by kind.
    pub mutations_rejected_total: IntCounterVec,
    /// Apply latency, labeled by kind.
    pub apply_duration_seconds: HistogramVec,
    /// Current committed topology version.
    pub current_version: IntGauge,
    /// Leadership changes observed by this node.
    pub leadership_changes_total: IntCounter,
    /// Prometheus registry mutations are registered against.
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Construct and register a fresh metrics set.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let mutations_total = register_int_counter_vec!(
            "topology_mutations_total",
            "Total committed topology mutations",
            &["kind"]
        )?;
        registry.register(Box::new(mutations_total.clone()))?;

        let mutations_rejected_total = register_int_counter_vec!(
            "topology_mutations_rejected_total",
            "Total rejected topology mutation proposals",
            &["kind"]
        )?;
        registry.register(Box::new(mutations_rejected_total.clone()))?;

        let apply_duration_seconds = register_histogram_vec!(
            "topology_apply_duration_seconds",
            "Time to propose, commit and apply a mutation",
            &["kind"],
            vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]
        )?;
        registry.register(Box::new(apply_duration_seconds.clone()))?;

        let current_version = register_int_gauge!(
            "topology_current_version",
            "Version of the currently committed topology"
        )?;
        registry.register(Box::new(current_version.clone()))?;

        let leadership_changes_total = register_int_counter!(
            "topology_leadership_changes_total",
            "Number of times this node's leadership status changed"
        )?;
        registry.register(Box::new(leadership_changes_total.clone()))?;

        Ok(Self {
            mutations_total,
            mutations_rejected_total,
            apply_duration_seconds,
            current_version,
            leadership_changes_total,
            registry,
        })
    }

    /// Record a successfully committed and applied mutation.
    pub fn record_mutation(&self, kind: &str, duration_seconds: f64) {
        self.mutations_total.with_label_values(&[kind]).inc();
        self.apply_duration_seconds
            .with_label_values(&[kind])
            .observe(duration_seconds);
    }

    /// Record a rejected mutation proposal.
    pub fn record_rejection(&self, kind: &str) {
        self.mutations_rejected_total.with_label_values(&[kind]).inc();
    }

    /// Update the current topology version gauge.
    pub fn set_version(&self, version: u64) {
        self.current_version.set(version as i64);
    }

    /// Record a leadership status flip.
    pub fn record_leadership_change(&self) {
        self.leadership_changes_total.inc();
    }

    /// Access the underlying registry, e.g. to mount a `/metrics` endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("failed to register topology-store metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_mutation_and_version() {
        let metrics = Metrics::new().unwrap();
        metrics.record_mutation("register_node", 0.002);
        metrics.set_version(3);
        assert_eq!(metrics.current_version.get(), 3);
        assert_eq!(
            metrics
                .mutations_total
                .with_label_values(&["register_node"])
                .get(),
            1
        );
    }
}
