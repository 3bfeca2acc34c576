//! Prometheus metrics for the change notifier.

use std::sync::Arc;

use prometheus::{IntCounter, IntGauge, Registry};

/// Counters and gauges tracking subscriber fan-out health.
#[derive(Debug)]
pub struct Metrics {
    /// Events successfully delivered to a subscriber queue.
    pub events_delivered_total: IntCounter,
    /// Times a subscriber's queue overflowed and was resynchronized.
    pub overflows_total: IntCounter,
    /// Subscribers closed for idleness.
    pub idle_closures_total: IntCounter,
    /// Heartbeats sent to idle subscribers.
    pub heartbeats_total: IntCounter,
    /// Currently connected subscribers.
    pub subscribers: IntGauge,
    registry: Arc<Registry>,
}

impl Metrics {
    /// Register all metrics against a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let events_delivered_total = IntCounter::new(
            "change_notifier_events_delivered_total",
            "Events successfully delivered to a subscriber",
        )?;
        let overflows_total = IntCounter::new(
            "change_notifier_overflows_total",
            "Subscriber queue overflows requiring a full-snapshot resync",
        )?;
        let idle_closures_total = IntCounter::new(
            "change_notifier_idle_closures_total",
            "Subscribers closed for exceeding the idle timeout",
        )?;
        let heartbeats_total = IntCounter::new(
            "change_notifier_heartbeats_total",
            "Heartbeat events sent to idle subscribers",
        )?;
        let subscribers = IntGauge::new(
            "change_notifier_subscribers",
            "Currently connected subscribers",
        )?;

        registry.register(Box::new(events_delivered_total.clone()))?;
        registry.register(Box::new(overflows_total.clone()))?;
        registry.register(Box::new(idle_closures_total.clone()))?;
        registry.register(Box::new(heartbeats_total.clone()))?;
        registry.register(Box::new(subscribers.clone()))?;

        Ok(Self {
            events_delivered_total,
            overflows_total,
            idle_closures_total,
            heartbeats_total,
            subscribers,
            registry: Arc::new(registry),
        })
    }

    /// The registry backing these metrics, for exposition.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record one successful delivery.
    pub fn record_delivered(&self) {
        self.events_delivered_total.inc();
    }

    /// Record one overflow-triggered resync.
    pub fn record_overflow(&self) {
        self.overflows_total.inc();
    }

    /// Record one idle-timeout closure.
    pub fn record_idle_closure(&self) {
        self.idle_closures_total.inc();
    }

    /// Record one heartbeat sent.
    pub fn record_heartbeat(&self) {
        self.heartbeats_total.inc();
    }

    /// Set the current subscriber count gauge.
    pub fn set_subscriber_count(&self, count: usize) {
        self.subscribers.set(count as i64);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("metric registration cannot fail with fixed, non-duplicate names")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reports() {
        let metrics = Metrics::new().unwrap();
        metrics.record_delivered();
        metrics.record_overflow();
        metrics.set_subscriber_count(3);
        assert_eq!(metrics.events_delivered_total.get(), 1);
        assert_eq!(metrics.overflows_total.get(), 1);
        assert_eq!(metrics.subscribers.get(), 3);
    }
}
