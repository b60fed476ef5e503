//! Response handler: the lifecycle of one response on a shared channel.
//!
//! The handler is safe to drive from any number of threads at once, but it
//! only orders its own writes. Anyone else holding the channel may close it at
//! any time, so a write accepted here is not guaranteed to reach the peer.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode};

use crate::channel::{Channel, ChannelError, Frame, ResponseMetadata, WriteHandle};
use crate::config::HandlerConfig;
use crate::error::{LockKind, ResponseError};
use crate::observability::ResponseMetrics;
use crate::response::connection::ConnectionId;
use crate::response::error_map;
use crate::response::state::{ResponseState, StateGuards};
use crate::response::tracker::WriteTracker;

/// Writes one response: metadata once, body chunks in call order, close once.
pub struct ResponseHandler {
    connection: ConnectionId,
    channel: Arc<dyn Channel>,
    tracker: WriteTracker,
    metrics: ResponseMetrics,
    state: StateGuards,
}

impl ResponseHandler {
    pub fn new(
        connection: ConnectionId,
        channel: Arc<dyn Channel>,
        tracker: WriteTracker,
        metrics: ResponseMetrics,
        config: &HandlerConfig,
    ) -> Self {
        let state = StateGuards::new(config, channel.new_succeeded_handle());
        tracing::trace!(connection_id = %connection, "Response handler created");
        Self {
            connection,
            channel,
            tracker,
            metrics,
            state,
        }
    }

    /// Set a response header, replacing any previous value.
    ///
    /// Fails with [`ResponseError::MetadataAlreadySent`] once metadata has gone out.
    pub fn set_header(&self, name: HeaderName, value: HeaderValue) -> Result<(), ResponseError> {
        tracing::trace!(connection_id = %self.connection, header = %name, "Changing header");
        self.change_metadata(|metadata| {
            metadata.headers.insert(name, value);
        })
    }

    /// Set the `Content-Type` header.
    pub fn set_content_type(&self, content_type: &str) -> Result<(), ResponseError> {
        let value = HeaderValue::from_str(content_type)
            .map_err(|e| ResponseError::InvalidHeader(format!("{content_type:?}: {e}")))?;
        self.set_header(CONTENT_TYPE, value)
    }

    /// Set the response status. Defaults to `200 OK`.
    pub fn set_status(&self, status: StatusCode) -> Result<(), ResponseError> {
        self.change_metadata(|metadata| metadata.status = status)
    }

    /// Append a body chunk, sending the metadata first if needed.
    ///
    /// `is_last` marks the chunk as the end of the body. If the metadata could
    /// not be written because a guard timed out, nothing is sent and the
    /// timeout is returned; the next call tries the metadata again.
    pub fn add_to_body(&self, data: Bytes, is_last: bool) -> Result<WriteHandle, ResponseError> {
        if !self.state.is_metadata_written() {
            self.write_metadata_lazily()?;
        }
        tracing::trace!(
            connection_id = %self.connection,
            bytes = data.len(),
            is_last,
            "Adding data to response"
        );
        self.write_to_channel(Frame::Content { data, last: is_last })
    }

    /// Ask the transport to push out buffered writes.
    ///
    /// Advisory: a failure (typically a channel closed by another owner) is
    /// logged and counted, not returned.
    pub fn flush(&self) {
        if !self.state.is_metadata_written() {
            if let Err(e) = self.write_metadata_lazily() {
                tracing::debug!(connection_id = %self.connection, error = %e, "Response metadata not written");
            }
        }
        tracing::trace!(connection_id = %self.connection, "Flushing response data to channel");
        if let Err(e) = self.channel.flush() {
            tracing::debug!(connection_id = %self.connection, error = %e, "Flush failed");
            self.metrics.flush_errors.increment(1);
        }
    }

    /// Finish the response. Only the first call has any effect.
    ///
    /// With a `cause`, an error response is sent if the metadata has not gone
    /// out yet; otherwise the failure is only counted, since headers already
    /// on the wire cannot be replaced. The channel is then flushed and its
    /// close is scheduled after the last write. If the error response could
    /// not be submitted at all, the flush is skipped and the peer only sees
    /// the close.
    pub fn on_request_complete(&self, cause: Option<&(dyn StdError + 'static)>) {
        if !self.state.mark_request_complete() {
            return;
        }
        tracing::trace!(connection_id = %self.connection, "Finished responding to current request");
        self.metrics.request_completions.increment(1);

        let mut flush = true;
        if let Some(cause) = cause {
            self.metrics.request_handling_errors.increment(1);
            flush = self.send_error_response(cause);
        }

        // Default metadata must not stand in for an error response that never went out.
        if flush {
            self.flush();
        }
        if let Err(e) = self.close() {
            tracing::error!(
                connection_id = %self.connection,
                error = %e,
                "Swallowing failure encountered during request completion"
            );
            self.metrics.complete_tasks_errors.increment(1);
        }
    }

    pub fn is_request_complete(&self) -> bool {
        self.state.is_request_complete()
    }

    /// Current lifecycle position.
    pub fn state(&self) -> ResponseState {
        self.state.state()
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    /// Returns false if the error response was not sent and the metadata is
    /// still unsent.
    fn send_error_response(&self, cause: &(dyn StdError + 'static)) -> bool {
        if self.state.is_metadata_written() {
            tracing::warn!(
                connection_id = %self.connection,
                error = %cause,
                "Response metadata already sent, cannot send error response"
            );
            self.metrics.response_sending_errors.increment(1);
            return true;
        }

        tracing::trace!(connection_id = %self.connection, "Sending error response to client");
        let frame = error_map::map_error(cause, &self.metrics).into_frame();
        let handle = self.maybe_write_metadata(Some(frame));
        if let Some(Err(e)) = handle.outcome() {
            // The channel gets closed regardless, so the client still learns of the failure.
            tracing::error!(
                connection_id = %self.connection,
                error = %e,
                "Swallowing failure encountered while sending error response"
            );
            self.metrics.response_sending_errors.increment(1);
        }
        self.state.is_metadata_written()
    }

    /// Only an interrupted attempt is reported: the metadata is still unsent
    /// and no body chunk may go out ahead of it.
    fn write_metadata_lazily(&self) -> Result<(), ResponseError> {
        match self.try_write_metadata(None) {
            Ok(_) => Ok(()),
            Err(e) if e.is_interrupted() => Err(e),
            Err(e) => {
                // Usually another thread won the race to send it.
                tracing::trace!(connection_id = %self.connection, error = %e, "Response metadata not written");
                Ok(())
            }
        }
    }

    /// Send metadata unless it already went out. Failures come back as a
    /// failed handle, since callers on the lazy path do not act on them.
    fn maybe_write_metadata(&self, replacement: Option<Frame>) -> WriteHandle {
        match self.try_write_metadata(replacement) {
            Ok(handle) => handle,
            Err(e) => self.channel.new_failed_handle(ChannelError::Rejected(e.to_string())),
        }
    }

    fn try_write_metadata(&self, replacement: Option<Frame>) -> Result<WriteHandle, ResponseError> {
        let metadata = self.state
            .lock_metadata()
            .inspect_err(|_| self.metrics.metadata_lock_interrupted.increment(1))?;
        self.state.verify_response_alive()?;

        let frame = replacement.unwrap_or_else(|| Frame::Metadata(metadata.clone()));
        if let Some(status) = frame.status() {
            tracing::trace!(connection_id = %self.connection, status = %status, "Sending response metadata");
        }

        // Published only after the write was submitted or refused by a closed
        // channel, and while the guard is still held, so no body chunk can
        // overtake the metadata. An interrupted attempt leaves it unsent.
        let result = self.write_to_channel(frame);
        if !matches!(&result, Err(e) if e.is_interrupted()) {
            self.state.mark_metadata_written();
        }
        drop(metadata);
        result
    }

    fn change_metadata<F>(&self, change: F) -> Result<(), ResponseError>
    where
        F: FnOnce(&mut ResponseMetadata),
    {
        let mut metadata = self.state
            .lock_metadata()
            .inspect_err(|_| self.metrics.metadata_lock_interrupted.increment(1))?;
        if let Err(e) = self.state.verify_response_alive() {
            self.metrics.dead_response_access_errors.increment(1);
            return Err(e);
        }
        change(&mut metadata);
        Ok(())
    }

    /// The single path to the transport. Writes are submitted in guard
    /// acquisition order.
    fn write_to_channel(&self, frame: Frame) -> Result<WriteHandle, ResponseError> {
        let mut write = self.state
            .lock_write(LockKind::Write)
            .inspect_err(|_| self.metrics.write_lock_interrupted.increment(1))?;
        if self.state.is_channel_closed() || !self.channel.is_active() {
            self.metrics.write_after_close_errors.increment(1);
            return Err(ResponseError::ChannelClosed);
        }

        tracing::trace!(connection_id = %self.connection, "Writing to channel");
        let handle = self.tracker.track(self.channel.write(frame));
        write.last_write = handle.clone();
        Ok(handle)
    }

    /// Schedule the channel close after the last write. Requested at most once.
    fn close(&self) -> Result<(), ResponseError> {
        if self.state.is_channel_closed() || !self.channel.is_open() {
            return Ok(());
        }
        let write = self.state
            .lock_write(LockKind::Close)
            .inspect_err(|_| self.metrics.close_lock_interrupted.increment(1))?;
        if self.state.mark_channel_closed() {
            self.channel.close_on_completion(&write.last_write);
            tracing::trace!(
                connection_id = %self.connection,
                after_write = %write.last_write.id(),
                "Requested closing of channel"
            );
        }
        Ok(())
    }
}

impl fmt::Debug for ResponseHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandler")
            .field("connection", &self.connection)
            .field("state", &self.state())
            .finish()
    }
}
