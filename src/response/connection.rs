//! Per-connection context shared by sequential responses.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Own the channel and the write tracker for the connection's lifetime
//! - Hand out a fresh response handler per request

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::channel::Channel;
use crate::config::HandlerConfig;
use crate::observability::ResponseMetrics;
use crate::response::handler::ResponseHandler;
use crate::response::tracker::WriteTracker;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Everything a response needs that outlives a single request.
pub struct ConnectionHandler {
    id: ConnectionId,
    channel: Arc<dyn Channel>,
    tracker: WriteTracker,
    metrics: ResponseMetrics,
    config: HandlerConfig,
}

impl ConnectionHandler {
    pub fn new(channel: Arc<dyn Channel>, config: HandlerConfig, metrics: ResponseMetrics) -> Self {
        let id = ConnectionId::new();
        let tracker = WriteTracker::new(id, Arc::clone(&channel), metrics.clone());
        tracing::debug!(connection_id = %id, "Connection handler created");
        Self {
            id,
            channel,
            tracker,
            metrics,
            config,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// A response handler for the next request on this connection.
    pub fn response_handler(&self) -> ResponseHandler {
        ResponseHandler::new(
            self.id,
            Arc::clone(&self.channel),
            self.tracker.clone(),
            self.metrics.clone(),
            &self.config,
        )
    }

    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    pub fn tracker(&self) -> &WriteTracker {
        &self.tracker
    }

    /// Writes issued on this connection that have not completed yet.
    pub fn in_flight_writes(&self) -> usize {
        self.tracker.in_flight()
    }
}

impl fmt::Debug for ConnectionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandler")
            .field("id", &self.id)
            .field("open", &self.channel.is_open())
            .field("in_flight_writes", &self.in_flight_writes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CompletionMode, MemoryChannel};
    use bytes::Bytes;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn handlers_share_tracker() {
        let channel = MemoryChannel::new(CompletionMode::Manual);
        let connection = ConnectionHandler::new(
            Arc::new(channel.clone()),
            HandlerConfig::default(),
            ResponseMetrics::default(),
        );

        let first = connection.response_handler();
        first.add_to_body(Bytes::from_static(b"one"), true).unwrap();
        let second = connection.response_handler();
        second.add_to_body(Bytes::from_static(b"two"), true).unwrap();

        // Two metadata frames plus two body frames, all tracked by the connection.
        assert_eq!(connection.in_flight_writes(), 4);
        channel.resolve_all();
        assert_eq!(connection.in_flight_writes(), 0);
    }
}
