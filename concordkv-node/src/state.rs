//! Shared application state handed to every axum handler.

use std::sync::Arc;

use change_notifier::ChangeNotifier;
use topology_service::TopologyService;
use topology_store::TopologyHandle;

/// Everything the admin REST surface needs, cloned cheaply per request
/// (every field is already `Arc`-backed or a clonable handle).
#[derive(Clone)]
pub struct AppState {
    /// C2 handle, used directly for proposals the admin surface exposes
    /// without C3 wrapping them (e.g. node health overrides).
    pub topology: TopologyHandle,
    /// C3: ring-backed reads and rebalance/migration actions.
    pub service: Arc<TopologyService>,
    /// C4: subscriber management for `/topology/subscribe`.
    pub notifier: Arc<ChangeNotifier>,
    /// C2's metrics registry.
    pub store_metrics: Arc<topology_store::Metrics>,
    /// C3's metrics registry.
    pub service_metrics: Arc<topology_service::Metrics>,
    /// C4's metrics registry.
    pub notifier_metrics: Arc<change_notifier::Metrics>,
}

impl AppState {
    /// Gather metric families from every component's registry for
    /// prometheus text exposition.
    pub fn gather_metrics(&self) -> Vec<prometheus::proto::MetricFamily> {
        let mut families = self.store_metrics.registry().gather();
        families.extend(self.service_metrics.registry().gather());
        families.extend(self.notifier_metrics.registry().gather());
        families
    }
}
