//! Split sink contract and completion signals
//!
//! The sink is the downstream bounded queue feeding query workers. The
//! loader only sees this trait: enqueue returns a [`CompletionSignal`]
//! that is already complete when the sink had capacity, and completes
//! later when capacity frees up. That signal is the producer's only
//! suspension point.
//!
//! Terminal markers are idempotent: once `fail` has been invoked the
//! sink absorbs further enqueues and `no_more_splits` calls as no-ops.

use crate::error::LoaderError;
use crate::split::InternalSplit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct SignalState {
    done: AtomicBool,
    notify: Notify,
}

/// An eventually-completing handle used to express backpressure
///
/// Cloning is cheap; all clones observe the same completion. The
/// already-complete form allocates nothing.
#[derive(Clone)]
pub struct CompletionSignal {
    // None means complete since construction
    state: Option<Arc<SignalState>>,
}

impl CompletionSignal {
    /// A signal that has always been complete
    pub fn completed() -> Self {
        Self { state: None }
    }

    /// A pending signal and the trigger that completes it
    pub fn pending() -> (Self, CompletionTrigger) {
        let state = Arc::new(SignalState {
            done: AtomicBool::new(false),
            notify: Notify::new(),
        });
        (
            Self {
                state: Some(Arc::clone(&state)),
            },
            CompletionTrigger { state },
        )
    }

    /// Non-blocking completion check
    pub fn is_complete(&self) -> bool {
        match &self.state {
            None => true,
            Some(state) => state.done.load(Ordering::Acquire),
        }
    }

    /// Wait until the signal completes. Returns immediately if it
    /// already has.
    pub async fn wait(&self) {
        let Some(state) = &self.state else {
            return;
        };
        while !state.done.load(Ordering::Acquire) {
            let notified = state.notify.notified();
            tokio::pin!(notified);
            // register before re-checking, or a trigger firing in
            // between is lost
            notified.as_mut().enable();
            if state.done.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Completes a pending [`CompletionSignal`]
pub struct CompletionTrigger {
    state: Arc<SignalState>,
}

impl CompletionTrigger {
    /// Complete the signal, waking every waiter. Idempotent.
    pub fn complete(&self) {
        self.state.done.store(true, Ordering::Release);
        self.state.notify.notify_waiters();
    }
}

/// The downstream consumer of splits
pub trait SplitSink: Send + Sync {
    /// Enqueue one split. The returned signal is complete iff the sink
    /// had capacity immediately.
    fn add_to_queue(&self, split: InternalSplit) -> CompletionSignal;

    /// Enqueue a batch of splits as one unit
    fn add_batch(&self, splits: Vec<InternalSplit>) -> CompletionSignal;

    /// Terminal marker: no further splits will arrive. Idempotent, and
    /// legal after `fail` or after the loader stopped.
    fn no_more_splits(&self);

    /// Terminal failure. Idempotent; the first error wins.
    fn fail(&self, error: LoaderError);
}
