//! Per-(shard, node) bounded connection pool (§4.5).
//!
//! Grounded on `message-bus::client::MessageBusClient`'s connect-on-demand
//! shape, generalized from a single outbound NATS connection to a keyed
//! pool of arbitrary, health-checkable connections — the wire protocol
//! itself is out of scope here, same as the storage-engine contract.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use topology_types::{NodeId, Result, ShardId};

/// A pooled connection reports whether it's still usable so the pool can
/// discard broken ones instead of handing them back out.
pub trait PooledConnection: Send + Sync {
    /// Whether this connection is healthy enough to be reused.
    fn is_healthy(&self) -> bool;
}

/// Opens fresh connections to a node on a pool miss.
#[async_trait::async_trait]
pub trait ConnectionFactory<C: PooledConnection>: Send + Sync {
    /// Establish a new connection to `node`.
    async fn connect(&self, node: &NodeId) -> Result<C>;
}

#[derive(Default)]
struct Slot<C> {
    idle: Mutex<VecDeque<C>>,
}

/// Bounded, lazily populated pool of reusable connections, keyed by
/// `(shard, node)` so a replica serving several shards still gets one
/// pool per shard relationship.
pub struct ConnectionPool<C, F> {
    factory: F,
    capacity: usize,
    slots: DashMap<(ShardId, NodeId), Arc<Slot<C>>>,
}

impl<C, F> ConnectionPool<C, F>
where
    C: PooledConnection,
    F: ConnectionFactory<C>,
{
    /// Build a pool that keeps at most `capacity` idle connections per
    /// `(shard, node)` key (default 8 per §4.5).
    pub fn new(factory: F, capacity: usize) -> Self {
        Self {
            factory,
            capacity,
            slots: DashMap::new(),
        }
    }

    /// Check out a connection, reusing an idle, healthy one if available
    /// and otherwise dialing a fresh one.
    pub async fn checkout(&self, shard: ShardId, node: &NodeId) -> Result<C> {
        let slot = self
            .slots
            .entry((shard, node.clone()))
            .or_insert_with(|| Arc::new(Slot::default()))
            .clone();

        let popped = {
            let mut idle = slot.idle.lock().await;
            idle.pop_front()
        };

        match popped {
            Some(conn) if conn.is_healthy() => Ok(conn),
            _ => self.factory.connect(node).await,
        }
    }

    /// Return a connection for reuse. A broken connection is dropped
    /// rather than pooled; once a slot already holds `capacity` idle
    /// connections the oldest is dropped to make room.
    pub async fn checkin(&self, shard: ShardId, node: &NodeId, conn: C) {
        if !conn.is_healthy() {
            return;
        }
        let Some(slot) = self.slots.get(&(shard, node.clone())) else {
            return;
        };
        let mut idle = slot.idle.lock().await;
        if idle.len() >= self.capacity {
            idle.pop_front();
        }
        idle.push_back(conn);
    }

    /// Number of idle connections currently held for `(shard, node)`.
    pub async fn idle_count(&self, shard: ShardId, node: &NodeId) -> usize {
        match self.slots.get(&(shard, node.clone())) {
            Some(slot) => slot.idle.lock().await.len(),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConn {
        healthy: bool,
    }

    impl PooledConnection for FakeConn {
        fn is_healthy(&self) -> bool {
            self.healthy
        }
    }

    struct CountingFactory {
        dials: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ConnectionFactory<FakeConn> for CountingFactory {
        async fn connect(&self, _node: &NodeId) -> Result<FakeConn> {
            self.dials.fetch_add(1, Ordering::Relaxed);
            Ok(FakeConn { healthy: true })
        }
    }

    #[tokio::test]
    async fn checkin_then_checkout_reuses_without_dialing() {
        let pool = ConnectionPool::new(CountingFactory { dials: AtomicUsize::new(0) }, 8);
        let shard = ShardId::new(0);
        let node = NodeId::new("n1");

        let conn = pool.checkout(shard, &node).await.unwrap();
        assert_eq!(pool.factory.dials.load(Ordering::Relaxed), 1);
        pool.checkin(shard, &node, conn).await;
        assert_eq!(pool.idle_count(shard, &node).await, 1);

        let _conn = pool.checkout(shard, &node).await.unwrap();
        assert_eq!(pool.factory.dials.load(Ordering::Relaxed), 1);
        assert_eq!(pool.idle_count(shard, &node).await, 0);
    }

    #[tokio::test]
    async fn unhealthy_connection_is_not_pooled() {
        let pool = ConnectionPool::new(CountingFactory { dials: AtomicUsize::new(0) }, 8);
        let shard = ShardId::new(0);
        let node = NodeId::new("n1");

        pool.checkin(shard, &node, FakeConn { healthy: false }).await;
        assert_eq!(pool.idle_count(shard, &node).await, 0);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_idle_connection() {
        let pool = ConnectionPool::new(CountingFactory { dials: AtomicUsize::new(0) }, 1);
        let shard = ShardId::new(0);
        let node = NodeId::new("n1");

        pool.checkin(shard, &node, FakeConn { healthy: true }).await;
        pool.checkin(shard, &node, FakeConn { healthy: true }).await;
        assert_eq!(pool.idle_count(shard, &node).await, 1);
    }
}
