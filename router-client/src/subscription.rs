//! Consumes the event stream C4 exposes and folds it into the local
//! cache (§4.5).
//!
//! Works identically whether the source is an in-process
//! `topology_store::TopologyHandle::subscribe` receiver (same-process
//! test harnesses) or `change-notifier`'s client-facing stream decoded
//! frame-by-frame — both ultimately yield `TopologyEvent`s, which is all
//! this loop depends on.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::Instant;
use topology_types::TopologyEvent;

use crate::config::Config;
use crate::snapshot::LocalTopology;

/// Consume `events` until the stream ends, applying each to `snapshot`.
///
/// A disconnected C4 does not break the client: it keeps serving its last
/// known snapshot, with gradually increasing staleness. Once no event
/// (including heartbeats) has arrived for `config.offline_threshold_secs`,
/// a single `tracing::warn!` fires; it re-arms the next time an event
/// resets the clock, per "after a configurable threshold the client
/// surfaces TopologyStale warnings".
pub async fn run(
    snapshot: Arc<LocalTopology>,
    config: Config,
    mut events: impl Stream<Item = TopologyEvent> + Unpin,
) {
    let mut last_seen = Instant::now();
    let mut warned_stale = false;
    let offline_threshold = Duration::from_secs(config.offline_threshold_secs);

    loop {
        match tokio::time::timeout(offline_threshold, events.next()).await {
            Ok(Some(event)) => {
                last_seen = Instant::now();
                warned_stale = false;
                snapshot.apply_event(&event);
            }
            Ok(None) => break,
            Err(_) => {
                if !warned_stale {
                    tracing::warn!(
                        stale_for_ms = last_seen.elapsed().as_millis() as u64,
                        cached_version = snapshot.version(),
                        "topology snapshot stale: no events from the change notifier past the offline threshold"
                    );
                    warned_stale = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::wrappers::ReceiverStream;
    use topology_types::Topology;

    #[tokio::test]
    async fn applies_events_from_the_stream_until_closed() {
        let snapshot = Arc::new(LocalTopology::new(Topology::empty()));
        let (tx, rx) = tokio::sync::mpsc::channel(8);

        let mut replacement = Topology::empty();
        replacement.version = 3;
        tx.send(TopologyEvent::full_snapshot(replacement, 0)).await.unwrap();
        drop(tx);

        run(snapshot.clone(), Config { offline_threshold_secs: 60, ..Config::default() }, ReceiverStream::new(rx)).await;

        assert_eq!(snapshot.version(), 3);
    }
}
