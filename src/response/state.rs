//! Response lifecycle state.
//!
//! # States
//! - NotStarted: metadata still mutable
//! - MetadataSent: metadata handed to the transport, body may follow
//! - CompletionRequested: terminal sequence started
//! - Closed: close requested on the channel
//!
//! # State Transitions
//! ```text
//! NotStarted → MetadataSent: first of add_to_body / flush / on_request_complete
//! MetadataSent → CompletionRequested: on_request_complete (first caller only)
//! CompletionRequested → Closed: close scheduled after the last write
//! ```
//!
//! # Design Decisions
//! - Each transition is a one-shot flag; compare-and-set decides the single winner
//! - Two guards: metadata changes and channel writes are serialized separately
//! - Lock order is always metadata → write, never the reverse
//! - Guard acquisition is bounded; a timeout is reported, never waited out

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::channel::{ResponseMetadata, WriteHandle};
use crate::config::HandlerConfig;
use crate::error::{LockKind, ResponseError};

/// Observable position of a response in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    NotStarted,
    MetadataSent,
    CompletionRequested,
    Closed,
}

/// State protected by the write guard.
pub(crate) struct WriteState {
    /// Most recent write issued by this response; the close is chained to it.
    pub(crate) last_write: WriteHandle,
}

pub(crate) struct StateGuards {
    request_complete: AtomicBool,
    metadata_written: AtomicBool,
    channel_closed: AtomicBool,
    metadata: Mutex<ResponseMetadata>,
    write: Mutex<WriteState>,
    metadata_lock_timeout: Duration,
    write_lock_timeout: Duration,
}

impl StateGuards {
    pub(crate) fn new(config: &HandlerConfig, initial_write: WriteHandle) -> Self {
        Self {
            request_complete: AtomicBool::new(false),
            metadata_written: AtomicBool::new(false),
            channel_closed: AtomicBool::new(false),
            metadata: Mutex::new(ResponseMetadata::default()),
            write: Mutex::new(WriteState { last_write: initial_write }),
            metadata_lock_timeout: config.metadata_lock_timeout(),
            write_lock_timeout: config.write_lock_timeout(),
        }
    }

    /// Acquire the metadata guard.
    pub(crate) fn lock_metadata(&self) -> Result<MutexGuard<'_, ResponseMetadata>, ResponseError> {
        self.metadata
            .try_lock_for(self.metadata_lock_timeout)
            .ok_or(ResponseError::OperationInterrupted { lock: LockKind::Metadata })
    }

    /// Acquire the write guard. `purpose` only labels the failure.
    pub(crate) fn lock_write(
        &self,
        purpose: LockKind,
    ) -> Result<MutexGuard<'_, WriteState>, ResponseError> {
        self.write
            .try_lock_for(self.write_lock_timeout)
            .ok_or(ResponseError::OperationInterrupted { lock: purpose })
    }

    /// Wins for exactly one caller.
    pub(crate) fn mark_request_complete(&self) -> bool {
        self.request_complete
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_request_complete(&self) -> bool {
        self.request_complete.load(Ordering::Acquire)
    }

    /// Must be called with the metadata guard held.
    pub(crate) fn mark_metadata_written(&self) {
        self.metadata_written.store(true, Ordering::Release);
    }

    pub(crate) fn is_metadata_written(&self) -> bool {
        self.metadata_written.load(Ordering::Acquire)
    }

    /// Wins for exactly one caller.
    pub(crate) fn mark_channel_closed(&self) -> bool {
        self.channel_closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_channel_closed(&self) -> bool {
        self.channel_closed.load(Ordering::Acquire)
    }

    /// Fails once metadata has gone out. Atomic only under the metadata guard.
    pub(crate) fn verify_response_alive(&self) -> Result<(), ResponseError> {
        if self.is_metadata_written() {
            return Err(ResponseError::MetadataAlreadySent);
        }
        Ok(())
    }

    pub(crate) fn state(&self) -> ResponseState {
        if self.is_channel_closed() {
            ResponseState::Closed
        } else if self.is_request_complete() {
            ResponseState::CompletionRequested
        } else if self.is_metadata_written() {
            ResponseState::MetadataSent
        } else {
            ResponseState::NotStarted
        }
    }
}
