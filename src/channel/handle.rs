//! Write handles: one-shot completion notifications for transport writes.
//!
//! A transport creates a [`WritePromise`]/[`WriteHandle`] pair per write, keeps
//! the promise and returns the handle. The promise resolves exactly once;
//! dropping it unresolved fails the handle so no observer waits forever.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::ChannelError;

/// Result of a transport write.
pub type WriteOutcome = Result<(), ChannelError>;

type Listener = Box<dyn FnOnce(&WriteOutcome) + Send>;

/// Only uniqueness matters, so relaxed ordering is enough.
static WRITE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriteId(u64);

impl WriteId {
    fn next() -> Self {
        Self(WRITE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "write-{}", self.0)
    }
}

enum State {
    Pending(Vec<Listener>),
    Done(WriteOutcome),
}

struct Shared {
    id: WriteId,
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    /// Returns false if the write was already resolved.
    fn resolve(&self, outcome: WriteOutcome) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            if matches!(*state, State::Done(_)) {
                return false;
            }
            match std::mem::replace(&mut *state, State::Done(outcome.clone())) {
                State::Pending(listeners) => listeners,
                State::Done(_) => Vec::new(),
            }
        };
        self.notify.notify_waiters();
        // Listeners run outside the lock so they may inspect the handle.
        for listener in listeners {
            listener(&outcome);
        }
        true
    }
}

/// Observer side of a write. Cheap to clone; all clones share one outcome.
#[derive(Clone)]
pub struct WriteHandle {
    shared: Arc<Shared>,
}

impl WriteHandle {
    /// A handle resolved successfully.
    pub fn succeeded() -> Self {
        let (promise, handle) = WritePromise::new();
        promise.complete(Ok(()));
        handle
    }

    /// A handle resolved with `cause`.
    pub fn failed(cause: ChannelError) -> Self {
        let (promise, handle) = WritePromise::new();
        promise.complete(Err(cause));
        handle
    }

    pub fn id(&self) -> WriteId {
        self.shared.id
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Done(_))
    }

    /// Done and succeeded.
    pub fn is_success(&self) -> bool {
        matches!(*self.shared.state.lock(), State::Done(Ok(())))
    }

    /// Snapshot of the outcome, `None` while pending.
    pub fn outcome(&self) -> Option<WriteOutcome> {
        match &*self.shared.state.lock() {
            State::Pending(_) => None,
            State::Done(outcome) => Some(outcome.clone()),
        }
    }

    /// Run `listener` once the write resolves.
    ///
    /// If the write is already resolved the listener runs immediately on the
    /// calling thread; otherwise it runs on whichever thread resolves it.
    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&WriteOutcome) + Send + 'static,
    {
        let ready = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending(listeners) => {
                    listeners.push(Box::new(listener));
                    return;
                }
                State::Done(outcome) => outcome.clone(),
            }
        };
        listener(&ready);
    }

    /// Wait for the write to resolve.
    pub async fn completion(&self) -> WriteOutcome {
        loop {
            let notified = self.shared.notify.notified();
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteHandle")
            .field("id", &self.shared.id)
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// Transport side of a write. Resolving consumes it.
pub struct WritePromise {
    shared: Option<Arc<Shared>>,
}

impl WritePromise {
    /// Create a pending write with a fresh [`WriteId`].
    pub fn new() -> (WritePromise, WriteHandle) {
        let shared = Arc::new(Shared {
            id: WriteId::next(),
            state: Mutex::new(State::Pending(Vec::new())),
            notify: Notify::new(),
        });
        let handle = WriteHandle { shared: Arc::clone(&shared) };
        (WritePromise { shared: Some(shared) }, handle)
    }

    pub fn id(&self) -> Option<WriteId> {
        self.shared.as_ref().map(|s| s.id)
    }

    /// Resolve the write and run its listeners on the calling thread.
    pub fn complete(mut self, outcome: WriteOutcome) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(outcome);
        }
    }
}

impl Drop for WritePromise {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            if shared.resolve(Err(ChannelError::Rejected("write abandoned by transport".into()))) {
                tracing::debug!(write_id = %shared.id, "Write promise dropped unresolved");
            }
        }
    }
}

impl fmt::Debug for WritePromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritePromise").field("id", &self.id()).finish()
    }
}
