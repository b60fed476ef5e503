//! Shared utilities for response lifecycle tests.

use std::sync::Arc;

use metrics_util::debugging::Snapshotter;
use rest_responder::channel::{Channel, CompletionMode, MemoryChannel};
use rest_responder::config::HandlerConfig;
use rest_responder::observability::ResponseMetrics;
use rest_responder::response::{ConnectionHandler, ResponseHandler};

#[path = "../../src/observability/testing.rs"]
mod testing;

pub use testing::MetricsSnapshot;

/// One connection wired to a recording channel and a private metrics recorder.
pub struct Harness {
    pub channel: MemoryChannel,
    pub connection: ConnectionHandler,
    pub handler: ResponseHandler,
    snapshotter: Snapshotter,
}

impl Harness {
    pub fn new(mode: CompletionMode) -> Self {
        Self::with_config(mode, HandlerConfig::default())
    }

    pub fn with_config(mode: CompletionMode, config: HandlerConfig) -> Self {
        let channel = MemoryChannel::new(mode);
        let (metrics, snapshotter) = testing::recorded_with(ResponseMetrics::register);

        let shared: Arc<dyn Channel> = Arc::new(channel.clone());
        let connection = ConnectionHandler::new(shared, config, metrics);
        let handler = connection.response_handler();
        Self {
            channel,
            connection,
            handler,
            snapshotter,
        }
    }

    /// Read back every metric recorded so far. Drains histogram samples.
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::take(&self.snapshotter)
    }
}
