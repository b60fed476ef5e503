//! Transport contract consumed by the response layer.
//!
//! # Data Flow
//! ```text
//! ResponseHandler
//!     → Channel::write(Frame)          (non-blocking, returns WriteHandle)
//!     → WriteTracker::track(handle)    (latency / failure bookkeeping)
//!
//! Transport threads
//!     → WritePromise::complete(outcome)
//!     → listeners registered on the WriteHandle run (tracker, scheduled close)
//! ```
//!
//! # Design Decisions
//! - The response layer never implements a transport, it only consumes this trait
//! - Writes are fire-and-forget; completion is observed through [`WriteHandle`]
//! - `flush` is best-effort and may fail if someone else closed the transport
//! - `close_on_completion` sequences a close after a write without blocking

pub mod handle;
pub mod memory;

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use thiserror::Error;

pub use handle::{WriteHandle, WriteId, WriteOutcome, WritePromise};
pub use memory::{ChannelEvent, CompletionMode, MemoryChannel};

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for ResponseMetadata {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

/// One unit handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Status and headers; body frames follow.
    Metadata(ResponseMetadata),
    /// A body chunk. `last` marks the end of the response body.
    Content { data: Bytes, last: bool },
    /// Metadata and complete body in a single frame.
    Full { metadata: ResponseMetadata, body: Bytes },
}

impl Frame {
    /// True if this frame carries response metadata.
    pub fn is_metadata(&self) -> bool {
        matches!(self, Frame::Metadata(_) | Frame::Full { .. })
    }

    /// Status carried by a metadata frame.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Frame::Metadata(metadata) | Frame::Full { metadata, .. } => Some(metadata.status),
            Frame::Content { .. } => None,
        }
    }

    /// True if nothing may follow this frame in the response.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Frame::Content { last: true, .. } | Frame::Full { .. })
    }
}

/// Transport-level failures.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The transport is closed.
    #[error("channel closed")]
    Closed,

    /// The write was rejected before it reached the transport.
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The transport failed while writing.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        ChannelError::Io(Arc::new(err))
    }
}

/// A streaming, possibly shared, network transport.
///
/// Implementations must be callable from any thread. Other owners of the same
/// transport may close it at any time, so callers get no delivery guarantee.
pub trait Channel: Send + Sync + 'static {
    /// The transport has not been closed.
    fn is_open(&self) -> bool;

    /// The transport is connected and can carry writes.
    fn is_active(&self) -> bool;

    /// Submit a frame. Never blocks; the outcome arrives on the handle.
    fn write(&self, frame: Frame) -> WriteHandle;

    /// Request that buffered writes be pushed out.
    fn flush(&self) -> Result<(), ChannelError>;

    /// Close immediately. Pending writes may be discarded.
    fn close(&self);

    /// Close once `handle` has completed, whatever its outcome.
    fn close_on_completion(&self, handle: &WriteHandle);

    /// A handle that is already resolved successfully.
    fn new_succeeded_handle(&self) -> WriteHandle {
        WriteHandle::succeeded()
    }

    /// A handle that is already resolved with `cause`.
    fn new_failed_handle(&self, cause: ChannelError) -> WriteHandle {
        WriteHandle::failed(cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_classification() {
        let meta = Frame::Metadata(ResponseMetadata::default());
        assert!(meta.is_metadata());
        assert!(!meta.is_terminal());

        let chunk = Frame::Content { data: Bytes::from_static(b"a"), last: false };
        assert!(!chunk.is_metadata());
        assert!(!chunk.is_terminal());

        let last = Frame::Content { data: Bytes::new(), last: true };
        assert!(last.is_terminal());

        let full = Frame::Full { metadata: ResponseMetadata::default(), body: Bytes::new() };
        assert!(full.is_metadata());
        assert!(full.is_terminal());
    }

    #[test]
    fn test_default_metadata_is_ok() {
        let meta = ResponseMetadata::default();
        assert_eq!(meta.status, StatusCode::OK);
        assert!(meta.headers.is_empty());
    }
}
