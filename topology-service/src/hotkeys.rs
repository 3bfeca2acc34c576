//! Hot-key detection (§4.3): per-key QPS over a rolling window, surfaced in
//! the topology's `hot_keys` list so clients can apply local caching.

use crate::config::HotKeyConfig;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use topology_types::{HotKey, ShardId};

struct Counter {
    shard_id: ShardId,
    count: AtomicU64,
    window_start_ms: AtomicU64,
}

/// Tracks per-key access counts over a rolling window and reports keys
/// whose rate exceeds the configured threshold.
///
/// Grounded on the same sharded-counter shape as a velocity tracker: many
/// independent keys, each cheaply incremented without a global lock.
pub struct HotKeyTracker {
    counters: DashMap<u64, Counter>,
    config: HotKeyConfig,
}

impl HotKeyTracker {
    /// Construct a tracker with the given configuration.
    pub fn new(config: HotKeyConfig) -> Self {
        Self {
            counters: DashMap::new(),
            config,
        }
    }

    /// Record one access to `key_hash`, owned by `shard_id`, at `now_ms`.
    pub fn record(&self, key_hash: u64, shard_id: ShardId, now_ms: i64) {
        let now_ms = now_ms as u64;
        let mut entry = self.counters.entry(key_hash).or_insert_with(|| Counter {
            shard_id,
            count: AtomicU64::new(0),
            window_start_ms: AtomicU64::new(now_ms),
        });

        let window_ms = self.config.window_secs * 1000;
        let start = entry.window_start_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(start) >= window_ms {
            entry.count.store(0, Ordering::Relaxed);
            entry.window_start_ms.store(now_ms, Ordering::Relaxed);
        }
        entry.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Compute the current `hot_keys` snapshot: every key whose rate over
    /// its window exceeds `qps_threshold`. Does not clear counters; call
    /// sites sweep on an independent timer.
    pub fn snapshot(&self, now_ms: i64) -> Vec<HotKey> {
        let now_ms = now_ms as u64;
        let window_ms = self.config.window_secs.max(1) * 1000;
        let mut hot = Vec::new();
        for entry in self.counters.iter() {
            let start = entry.window_start_ms.load(Ordering::Relaxed);
            let elapsed_secs = (now_ms.saturating_sub(start).max(1)) as f64 / 1000.0;
            let count = entry.count.load(Ordering::Relaxed) as f64;
            let qps = count / elapsed_secs.max(1.0 / window_ms as f64 * 1000.0);
            if qps >= self.config.qps_threshold {
                hot.push(HotKey {
                    key_hash: *entry.key(),
                    shard_id: entry.shard_id,
                    qps,
                });
            }
        }
        hot
    }

    /// Drop counters whose window has fully expired, to bound memory.
    pub fn evict_stale(&self, now_ms: i64) {
        let now_ms = now_ms as u64;
        let window_ms = self.config.window_secs * 1000;
        self.counters
            .retain(|_, c| now_ms.saturating_sub(c.window_start_ms.load(Ordering::Relaxed)) < window_ms * 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_exceeding_threshold_is_reported_hot() {
        let tracker = HotKeyTracker::new(HotKeyConfig {
            window_secs: 1,
            qps_threshold: 5.0,
        });
        for _ in 0..10 {
            tracker.record(42, ShardId::new(0), 1_000);
        }
        let hot = tracker.snapshot(1_500);
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].key_hash, 42);
    }

    #[test]
    fn cold_key_is_not_reported() {
        let tracker = HotKeyTracker::new(HotKeyConfig {
            window_secs: 60,
            qps_threshold: 100.0,
        });
        tracker.record(7, ShardId::new(0), 1_000);
        let hot = tracker.snapshot(2_000);
        assert!(hot.is_empty());
    }

    #[test]
    fn window_rollover_resets_count() {
        let tracker = HotKeyTracker::new(HotKeyConfig {
            window_secs: 1,
            qps_threshold: 3.0,
        });
        for _ in 0..5 {
            tracker.record(1, ShardId::new(0), 0);
        }
        // Past the window: counter resets instead of accumulating forever.
        tracker.record(1, ShardId::new(0), 5_000);
        let hot = tracker.snapshot(5_100);
        assert!(hot.is_empty());
    }
}
