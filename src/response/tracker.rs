//! Write tracking for one connection.
//!
//! # Responsibilities
//! - Remember when each write was issued
//! - Record write latency when a write succeeds
//! - Close the connection when any write fails
//!
//! # Design Decisions
//! - One tracker per connection, shared by every response on it
//! - Insert happens on the issuing thread, removal on the transport's thread;
//!   the map's entry API detects duplicates without an extra lock
//! - A failed write poisons the connection: partial output cannot be resumed
//! - Bookkeeping anomalies are logged and counted, never propagated

use std::sync::Arc;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::channel::{Channel, WriteHandle, WriteId, WriteOutcome};
use crate::observability::ResponseMetrics;
use crate::response::connection::ConnectionId;

struct TrackerInner {
    connection: ConnectionId,
    channel: Arc<dyn Channel>,
    writes: DashMap<WriteId, Instant>,
    metrics: ResponseMetrics,
}

/// Tracks in-flight writes on a channel and reacts to their completion.
#[derive(Clone)]
pub struct WriteTracker {
    inner: Arc<TrackerInner>,
}

impl WriteTracker {
    pub fn new(connection: ConnectionId, channel: Arc<dyn Channel>, metrics: ResponseMetrics) -> Self {
        tracing::trace!(connection_id = %connection, "Write tracker created");
        Self {
            inner: Arc::new(TrackerInner {
                connection,
                channel,
                writes: DashMap::new(),
                metrics,
            }),
        }
    }

    /// Start tracking `handle` and return it.
    ///
    /// Tracking the same write twice is a caller bug: the second request is
    /// dropped and counted, the first one stays in effect.
    pub fn track(&self, handle: WriteHandle) -> WriteHandle {
        let id = handle.id();
        let started = Instant::now();

        // The entry guard must be released before the listener is attached,
        // since an already-resolved handle runs it right away.
        let previous = match self.inner.writes.entry(id) {
            Entry::Occupied(existing) => Some(*existing.get()),
            Entry::Vacant(slot) => {
                slot.insert(started);
                None
            }
        };

        match previous {
            None => {
                let tracker = self.clone();
                handle.add_listener(move |outcome| tracker.on_write_complete(id, outcome));
            }
            Some(first_seen) => {
                tracing::warn!(
                    connection_id = %self.inner.connection,
                    write_id = %id,
                    tracked_for_ms = started.duration_since(first_seen).as_millis() as u64,
                    "Discarding duplicate write tracking request"
                );
                self.inner.metrics.write_already_tracked_errors.increment(1);
            }
        }
        handle
    }

    /// React to the completion of write `id`.
    pub fn on_write_complete(&self, id: WriteId, outcome: &WriteOutcome) {
        let Some((_, started)) = self.inner.writes.remove(&id) else {
            tracing::warn!(
                connection_id = %self.inner.connection,
                write_id = %id,
                "Write completion received for untracked write"
            );
            self.inner.metrics.write_not_found_errors.increment(1);
            return;
        };

        match outcome {
            Ok(()) => {
                let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
                self.inner.metrics.channel_write_latency_ms.record(elapsed_ms);
            }
            Err(e) => {
                tracing::error!(
                    connection_id = %self.inner.connection,
                    write_id = %id,
                    error = %e,
                    "Write on channel failed. Closing channel"
                );
                self.inner.metrics.channel_write_errors.increment(1);
                self.inner.channel.close();
            }
        }
    }

    /// Number of writes issued but not yet completed.
    pub fn in_flight(&self) -> usize {
        self.inner.writes.len()
    }
}
