//! Shared pause/cancel signal observed by the orchestrator and the executor.
//!
//! Cloning is cheap; every clone observes the same flags. Waiters are woken
//! through a single `Notify` whenever either flag changes.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Pause and cancel flags for one run.
#[derive(Debug, Clone, Default)]
pub struct ControlFlags {
    inner: Arc<ControlState>,
}

#[derive(Debug, Default)]
struct ControlState {
    paused: AtomicBool,
    cancelled: AtomicBool,
    changed: Notify,
}

impl ControlFlags {
    /// Fresh flags with neither signal set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pause at the next batch boundary.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
    }

    /// Clear a pending pause.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
    }

    /// Request cancellation. Irreversible for the run.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.changed.notify_waiters();
    }

    /// Whether a pause is requested.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Whether cancellation is requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested.
    pub async fn cancelled(&self) {
        loop {
            let mut notified = pin!(self.inner.changed.notified());
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Wait while paused. Returns `false` when cancellation ended the wait.
    pub async fn wait_while_paused(&self) -> bool {
        loop {
            let mut notified = pin!(self.inner.changed.notified());
            notified.as_mut().enable();
            if self.is_cancelled() {
                return false;
            }
            if !self.is_paused() {
                return true;
            }
            notified.await;
        }
    }
}
