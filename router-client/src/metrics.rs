//! Prometheus metrics for the router/client cache.

use std::sync::Arc;

use prometheus::{IntCounter, Registry};

/// Counters tracking routing outcomes.
#[derive(Debug)]
pub struct Metrics {
    /// Requests that completed on their first or a later attempt.
    pub requests_succeeded_total: IntCounter,
    /// Attempts that failed and were retried against another candidate.
    pub retries_total: IntCounter,
    /// Times an attempt failed with `StaleTopology` and backed off
    /// waiting for the subscription task to deliver a fresher snapshot.
    pub stale_refreshes_total: IntCounter,
    registry: Arc<Registry>,
}

impl Metrics {
    /// Register all metrics against a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_succeeded_total = IntCounter::new(
            "router_client_requests_succeeded_total",
            "Requests that completed successfully",
        )?;
        let retries_total = IntCounter::new(
            "router_client_retries_total",
            "Attempts retried against another replica candidate",
        )?;
        let stale_refreshes_total = IntCounter::new(
            "router_client_stale_refreshes_total",
            "StaleTopology responses that backed off awaiting a fresher snapshot",
        )?;

        registry.register(Box::new(requests_succeeded_total.clone()))?;
        registry.register(Box::new(retries_total.clone()))?;
        registry.register(Box::new(stale_refreshes_total.clone()))?;

        Ok(Self {
            requests_succeeded_total,
            retries_total,
            stale_refreshes_total,
            registry: Arc::new(registry),
        })
    }

    /// The registry backing these metrics, for exposition.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a successful request completion.
    pub fn record_success(&self) {
        self.requests_succeeded_total.inc();
    }

    /// Record a retried attempt.
    pub fn record_retry(&self) {
        self.retries_total.inc();
    }

    /// Record a `StaleTopology` back-off.
    pub fn record_stale_refresh(&self) {
        self.stale_refreshes_total.inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("metric registration cannot fail with fixed, non-duplicate names")
    }
}
