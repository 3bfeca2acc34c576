//! C4: fans out C2's committed event stream to an arbitrary number of
//! subscribers with bounded per-subscriber memory (§4.4).
//!
//! Grounded on the teacher's message-bus dispatch loop (one broadcast
//! source consumed by a background task, redistributed to per-client
//! channels), generalized from NATS subject fan-out to an in-process
//! `DashMap` of subscriptions since C4 and C2 share a process here.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use topology_store::TopologyHandle;
use topology_types::{Topology, TopologyEvent};

use crate::config::Config;
use crate::metrics::Metrics;
use crate::subscription::Subscription;

/// Fans out committed topology events to subscribers, demoting any
/// subscriber whose queue overflows to a resync with a fresh snapshot, and
/// closing subscribers that stop consuming.
pub struct ChangeNotifier {
    handle: TopologyHandle,
    subscribers: DashMap<Uuid, Subscription>,
    retention: Mutex<VecDeque<TopologyEvent>>,
    config: Config,
    metrics: Arc<Metrics>,
}

impl ChangeNotifier {
    /// Build the notifier and spawn its background fan-out and sweeper
    /// tasks. Returned wrapped in `Arc` since both tasks hold a clone.
    pub fn new(handle: TopologyHandle, config: Config, metrics: Arc<Metrics>) -> Arc<Self> {
        let notifier = Arc::new(Self {
            handle,
            subscribers: DashMap::new(),
            retention: Mutex::new(VecDeque::with_capacity(config.retention_capacity)),
            config,
            metrics,
        });
        Arc::clone(&notifier).spawn_fan_out();
        Arc::clone(&notifier).spawn_sweeper();
        notifier
    }

    /// Register a new subscriber. `last_acked_version` is `None` for a
    /// brand-new client (gets an immediate `FullSnapshot`); `Some(v)` for a
    /// reconnecting one. If `v` is still inside the retention window the
    /// subscriber resumes with buffered deltas; otherwise it is also reset
    /// with a `FullSnapshot`, per the S5 reconnect scenario.
    pub fn subscribe(&self, last_acked_version: Option<u64>) -> (Uuid, mpsc::Receiver<TopologyEvent>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let now = now_ms();
        let topology = self.handle.snapshot();
        let sub = Subscription::new(id, tx, topology.version, now);

        match last_acked_version.and_then(|v| self.replay_from(v)) {
            Some(backlog) if !backlog.is_empty() => {
                for event in backlog {
                    let _ = sub.try_send(event, now);
                }
            }
            _ => {
                let snapshot = TopologyEvent::full_snapshot(topology, now);
                let _ = sub.try_send(snapshot, now);
            }
        }

        self.subscribers.insert(id, sub);
        self.metrics.set_subscriber_count(self.subscribers.len());
        (id, rx)
    }

    /// Explicitly drop a subscriber (client-initiated disconnect).
    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.remove(&id);
        self.metrics.set_subscriber_count(self.subscribers.len());
    }

    /// Current number of connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn replay_from(&self, from_version: u64) -> Option<Vec<TopologyEvent>> {
        let buffer = self.retention.lock().unwrap();
        let oldest = buffer.front()?.from_version;
        if from_version < oldest {
            return None;
        }
        Some(
            buffer
                .iter()
                .filter(|event| event.from_version >= from_version)
                .cloned()
                .collect(),
        )
    }

    fn remember(&self, event: TopologyEvent) {
        if !event.advances_version() {
            return;
        }
        let mut buffer = self.retention.lock().unwrap();
        if buffer.len() >= self.config.retention_capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    fn spawn_fan_out(self: Arc<Self>) {
        let mut events = self.handle.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.dispatch(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        let topology = self.handle.snapshot();
                        self.resync_all(topology);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    fn dispatch(&self, event: TopologyEvent) {
        self.remember(event.clone());
        let now = now_ms();
        let mut overflowed = Vec::new();
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone(), now) {
                Ok(()) => self.metrics.record_delivered(),
                Err(mpsc::error::TrySendError::Full(_)) => overflowed.push(entry.key().to_owned()),
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(entry.key().to_owned()),
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
        if !overflowed.is_empty() {
            self.metrics.record_overflow();
            let topology = self.handle.snapshot();
            for id in overflowed {
                self.resync_one(id, &topology, now);
            }
        }
    }

    fn resync_one(&self, id: Uuid, topology: &Topology, now: i64) {
        let Some(sub) = self.subscribers.get(&id) else {
            return;
        };
        let snapshot = TopologyEvent::full_snapshot(topology.clone(), now);
        if sub.try_send(snapshot, now).is_err() {
            drop(sub);
            self.subscribers.remove(&id);
        }
    }

    fn resync_all(&self, topology: Topology) {
        let now = now_ms();
        let snapshot = TopologyEvent::full_snapshot(topology, now);
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.value().try_send(snapshot.clone(), now).is_err() {
                closed.push(entry.key().to_owned());
            }
        }
        for id in closed {
            self.subscribers.remove(&id);
        }
    }

    fn spawn_sweeper(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5));
        tokio::spawn(async move {
            loop {
                ticker.tick().await;
                self.sweep_once(now_ms());
            }
        });
    }

    fn sweep_once(&self, now: i64) {
        let idle_cutoff_ms = (self.config.idle_timeout_secs as i64) * 1000;
        let heartbeat_cutoff_ms = (self.config.heartbeat_interval_secs as i64) * 1000;
        let mut stale = Vec::new();
        for entry in self.subscribers.iter() {
            let sub = entry.value();
            let idle_for = now - sub.last_delivered_at_ms();
            if idle_for >= idle_cutoff_ms {
                stale.push(entry.key().to_owned());
            } else if idle_for >= heartbeat_cutoff_ms {
                let heartbeat = TopologyEvent::heartbeat(sub.last_sent_version(), now);
                if sub.try_send(heartbeat, now).is_ok() {
                    self.metrics.record_heartbeat();
                }
            }
        }
        for id in stale {
            self.subscribers.remove(&id);
            self.metrics.record_idle_closure();
        }
        self.metrics.set_subscriber_count(self.subscribers.len());
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use topology_store::consensus::StandaloneConsensus;
    use topology_store::MutationOp;
    use topology_types::{NodeDescriptor, NodeId};

    fn new_handle() -> TopologyHandle {
        topology_store::spawn(
            Topology::empty(),
            1,
            StdArc::new(StandaloneConsensus::new()),
            16,
            StdArc::new(topology_store::Metrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn fresh_subscriber_gets_a_full_snapshot_first() {
        let handle = new_handle();
        let notifier = ChangeNotifier::new(handle, Config::default(), StdArc::new(Metrics::new().unwrap()));
        let (_id, mut rx) = notifier.subscribe(None);
        let first = rx.recv().await.unwrap();
        assert!(matches!(first.kind, topology_types::EventKind::FullSnapshot));
    }

    #[tokio::test]
    async fn committed_mutation_is_delivered_in_order() {
        let handle = new_handle();
        let notifier = ChangeNotifier::new(handle.clone(), Config::default(), StdArc::new(Metrics::new().unwrap()));
        let (_id, mut rx) = notifier.subscribe(None);
        let _ = rx.recv().await.unwrap(); // initial snapshot

        handle
            .propose(MutationOp::RegisterNode {
                descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
            })
            .await
            .unwrap();

        let delta = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(delta.kind, topology_types::EventKind::NodeAdded));
        assert_eq!(delta.to_version, 1);
    }

    #[tokio::test]
    async fn overflow_triggers_resync_instead_of_blocking() {
        let handle = new_handle();
        let mut config = Config::default();
        config.queue_capacity = 1;
        let notifier = ChangeNotifier::new(handle.clone(), config, StdArc::new(Metrics::new().unwrap()));
        let (_id, mut rx) = notifier.subscribe(None);
        let _ = rx.recv().await.unwrap(); // drain the initial snapshot so the queue has room for one more

        for i in 0..5u16 {
            handle
                .propose(MutationOp::RegisterNode {
                    descriptor: NodeDescriptor::new(NodeId::new(format!("n{i}")), "a:1"),
                })
                .await
                .unwrap();
        }

        // The queue (capacity 1) cannot hold five deltas; the subscriber
        // must still observe a well-formed event rather than the sender
        // blocking forever.
        let observed = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(observed.to_version >= 1);
    }

    #[tokio::test]
    async fn reconnect_within_retention_resumes_with_deltas() {
        let handle = new_handle();
        let notifier = ChangeNotifier::new(handle.clone(), Config::default(), StdArc::new(Metrics::new().unwrap()));

        handle
            .propose(MutationOp::RegisterNode {
                descriptor: NodeDescriptor::new(NodeId::new("n1"), "a:1"),
            })
            .await
            .unwrap();

        let (_id, mut rx) = notifier.subscribe(Some(0));
        let first = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first.kind, topology_types::EventKind::NodeAdded));
    }

    #[tokio::test]
    async fn reconnect_outside_retention_gets_a_full_snapshot() {
        let handle = new_handle();
        let mut config = Config::default();
        config.retention_capacity = 1;
        let notifier = ChangeNotifier::new(handle.clone(), config, StdArc::new(Metrics::new().unwrap()));

        for i in 0..3u16 {
            handle
                .propose(MutationOp::RegisterNode {
                    descriptor: NodeDescriptor::new(NodeId::new(format!("n{i}")), "a:1"),
                })
                .await
                .unwrap();
        }

        let (_id, mut rx) = notifier.subscribe(Some(0));
        let first = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first.kind, topology_types::EventKind::FullSnapshot));
    }
}
