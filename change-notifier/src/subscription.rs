//! Per-subscriber state: `(subscriberId, lastAckedVersion, outboundQueue)`.
//!
//! One `Subscription` per connected client, holding the bounded mpsc sender
//! half of its stream plus the bookkeeping the fan-out and sweeper loops in
//! [`crate::notifier`] need without touching the channel itself.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::mpsc;
use topology_types::TopologyEvent;
use uuid::Uuid;

/// A single subscriber's outbound queue and delivery bookkeeping.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    sender: mpsc::Sender<TopologyEvent>,
    last_sent_version: AtomicU64,
    last_delivered_at_ms: AtomicI64,
}

impl Subscription {
    /// Construct a subscription around an already-created channel sender.
    pub fn new(id: Uuid, sender: mpsc::Sender<TopologyEvent>, starting_version: u64, now_ms: i64) -> Self {
        Self {
            id,
            sender,
            last_sent_version: AtomicU64::new(starting_version),
            last_delivered_at_ms: AtomicI64::new(now_ms),
        }
    }

    /// This subscriber's id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The version of the last event actually delivered (or the version it
    /// was created at, if nothing has been sent yet).
    pub fn last_sent_version(&self) -> u64 {
        self.last_sent_version.load(Ordering::Acquire)
    }

    /// Milliseconds since the epoch of the last successful delivery.
    pub fn last_delivered_at_ms(&self) -> i64 {
        self.last_delivered_at_ms.load(Ordering::Acquire)
    }

    /// Non-blocking delivery attempt. `Full` means the subscriber is behind
    /// and should be resynchronized with a snapshot; `Closed` means the
    /// receiving end is gone and the subscription should be dropped.
    pub fn try_send(
        &self,
        event: TopologyEvent,
        now_ms: i64,
    ) -> Result<(), mpsc::error::TrySendError<TopologyEvent>> {
        let to_version = event.to_version;
        self.sender.try_send(event)?;
        self.last_sent_version.store(to_version, Ordering::Release);
        self.last_delivered_at_ms.store(now_ms, Ordering::Release);
        Ok(())
    }
}
