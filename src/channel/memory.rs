//! In-memory transport that records everything it is asked to do.
//!
//! Used by the demo binary and by tests. Writes are resolved according to a
//! [`CompletionMode`], which lets tests pick between synchronous completion,
//! completion on tokio worker threads, or fully manual control.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use super::{Channel, ChannelError, Frame, WriteHandle, WriteId, WriteOutcome, WritePromise};

/// How writes submitted to a [`MemoryChannel`] get resolved.
#[derive(Debug, Clone)]
pub enum CompletionMode {
    /// Resolved inside `write`, on the calling thread.
    Immediate,
    /// Left pending until [`MemoryChannel::resolve_next`] or [`MemoryChannel::resolve_all`].
    Manual,
    /// Resolved by a task spawned on the given runtime.
    Spawned(Handle),
}

/// Something the channel was asked to do, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Write { id: WriteId, frame: Frame },
    Flush,
    CloseScheduled { after: WriteId },
    Closed,
}

struct Inner {
    open: AtomicBool,
    active: AtomicBool,
    fail_writes: AtomicBool,
    mode: CompletionMode,
    events: Mutex<Vec<ChannelEvent>>,
    pending: Mutex<VecDeque<WritePromise>>,
    closed_tx: watch::Sender<bool>,
}

impl Inner {
    fn record(&self, event: ChannelEvent) {
        self.events.lock().push(event);
    }

    fn default_outcome(&self) -> WriteOutcome {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "injected write failure").into())
        } else {
            Ok(())
        }
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        self.record(ChannelEvent::Closed);
        self.closed_tx.send_replace(true);
        tracing::trace!("Memory channel closed");

        // Promises are resolved outside the lock; their listeners may call back in.
        let drained: Vec<WritePromise> = self.pending.lock().drain(..).collect();
        for promise in drained {
            promise.complete(Err(ChannelError::Closed));
        }
    }
}

/// Recording in-memory [`Channel`]. Clones share the same transport.
#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

impl MemoryChannel {
    pub fn new(mode: CompletionMode) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                open: AtomicBool::new(true),
                active: AtomicBool::new(true),
                fail_writes: AtomicBool::new(false),
                mode,
                events: Mutex::new(Vec::new()),
                pending: Mutex::new(VecDeque::new()),
                closed_tx,
            }),
        }
    }

    /// Make every write resolved from now on fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate the peer going away without the channel being closed.
    pub fn deactivate(&self) {
        self.inner.active.store(false, Ordering::SeqCst);
    }

    /// Resolve the oldest pending write. Returns its id, if any was pending.
    pub fn resolve_next(&self, outcome: WriteOutcome) -> Option<WriteId> {
        let promise = self.inner.pending.lock().pop_front()?;
        let id = promise.id();
        promise.complete(outcome);
        id
    }

    /// Resolve every pending write with the default outcome, oldest first.
    pub fn resolve_all(&self) -> usize {
        let mut resolved = 0;
        loop {
            let Some(promise) = self.inner.pending.lock().pop_front() else {
                break;
            };
            promise.complete(self.inner.default_outcome());
            resolved += 1;
        }
        resolved
    }

    pub fn pending_writes(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Every recorded event, in order.
    pub fn events(&self) -> Vec<ChannelEvent> {
        self.inner.events.lock().clone()
    }

    /// Frames submitted via `write`, in order.
    pub fn written_frames(&self) -> Vec<Frame> {
        self.inner
            .events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ChannelEvent::Write { frame, .. } => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of frames written that carried response metadata.
    pub fn metadata_writes(&self) -> usize {
        self.written_frames().iter().filter(|f| f.is_metadata()).count()
    }

    /// Number of `close_on_completion` requests received.
    pub fn close_requests(&self) -> usize {
        self.inner
            .events
            .lock()
            .iter()
            .filter(|e| matches!(e, ChannelEvent::CloseScheduled { .. }))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        !self.inner.open.load(Ordering::SeqCst)
    }

    /// Wait until the channel is closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Channel for MemoryChannel {
    fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    fn is_active(&self) -> bool {
        self.is_open() && self.inner.active.load(Ordering::SeqCst)
    }

    fn write(&self, frame: Frame) -> WriteHandle {
        if !self.is_open() {
            return WriteHandle::failed(ChannelError::Closed);
        }
        let (promise, handle) = WritePromise::new();
        self.inner.record(ChannelEvent::Write { id: handle.id(), frame });

        match &self.inner.mode {
            CompletionMode::Immediate => promise.complete(self.inner.default_outcome()),
            CompletionMode::Manual => self.inner.pending.lock().push_back(promise),
            CompletionMode::Spawned(runtime) => {
                let outcome = self.inner.default_outcome();
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    promise.complete(outcome);
                });
            }
        }
        handle
    }

    fn flush(&self) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        self.inner.record(ChannelEvent::Flush);
        Ok(())
    }

    fn close(&self) {
        self.inner.close();
    }

    fn close_on_completion(&self, handle: &WriteHandle) {
        self.inner.record(ChannelEvent::CloseScheduled { after: handle.id() });
        let inner = Arc::clone(&self.inner);
        handle.add_listener(move |_| inner.close());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn chunk(data: &'static [u8]) -> Frame {
        Frame::Content { data: Bytes::from_static(data), last: false }
    }

    #[test]
    fn test_manual_writes_stay_pending() {
        let channel = MemoryChannel::new(CompletionMode::Manual);
        let handle = channel.write(chunk(b"a"));
        assert!(!handle.is_done());
        assert_eq!(channel.pending_writes(), 1);

        assert_eq!(channel.resolve_all(), 1);
        assert!(handle.is_success());
    }

    #[test]
    fn test_close_fails_pending_writes() {
        let channel = MemoryChannel::new(CompletionMode::Manual);
        let handle = channel.write(chunk(b"a"));
        channel.close();

        assert!(channel.is_closed());
        assert!(!channel.is_active());
        assert!(matches!(handle.outcome(), Some(Err(ChannelError::Closed))));
        assert!(channel.flush().is_err());
        assert!(matches!(
            channel.write(chunk(b"b")).outcome(),
            Some(Err(ChannelError::Closed))
        ));
    }

    #[test]
    fn test_close_on_completion_waits_for_handle() {
        let channel = MemoryChannel::new(CompletionMode::Manual);
        let handle = channel.write(chunk(b"a"));
        channel.close_on_completion(&handle);
        assert!(!channel.is_closed());

        channel.resolve_next(Ok(()));
        assert!(channel.is_closed());
        assert_eq!(
            channel.events(),
            vec![
                ChannelEvent::Write { id: handle.id(), frame: chunk(b"a") },
                ChannelEvent::CloseScheduled { after: handle.id() },
                ChannelEvent::Closed,
            ]
        );
    }

    #[test]
    fn test_failing_writes() {
        let channel = MemoryChannel::new(CompletionMode::Immediate);
        channel.set_fail_writes(true);
        let handle = channel.write(chunk(b"a"));
        assert!(matches!(handle.outcome(), Some(Err(ChannelError::Io(_)))));
    }

    #[tokio::test]
    async fn test_spawned_completion() {
        let channel = MemoryChannel::new(CompletionMode::Spawned(Handle::current()));
        let handle = channel.write(chunk(b"a"));
        assert!(handle.completion().await.is_ok());

        channel.close_on_completion(&handle);
        channel.closed().await;
        assert!(channel.is_closed());
    }
}
