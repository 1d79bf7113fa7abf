//! Watch signals (spec §4.A "watch semantics", §4.G).
//!
//! A `Watch` is a single-shot closeable event, created alongside every
//! tree node. A write transaction collects the old watch of every node
//! it replaces and closes all of them after publishing its new roots,
//! waking any reader parked on `changed()`. Closing is idempotent and
//! a `Watch` that is already closed resolves `changed()` immediately,
//! so a reader that raced the close still observes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
pub struct Watch {
    notify: Notify,
    closed: AtomicBool,
}

impl Watch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { notify: Notify::new(), closed: AtomicBool::new(false) })
    }

    /// Closes the signal. Idempotent: closing twice is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Waits until this signal is closed. Returns immediately if it is
    /// already closed.
    ///
    /// `notified()` must be constructed before the closed check below:
    /// tokio guarantees that a `Notify::notify_waiters()` call which
    /// happens after a `Notified` future is created, but before it is
    /// polled, is not missed. Checking `is_closed()` first and creating
    /// `notified()` second would race a concurrent `close()`.
    pub async fn changed(&self) {
        let notified = self.notify.notified();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    /// Like [`changed`](Self::changed), but also resolves early if
    /// `cancel` fires. Returns `true` if the signal closed, `false` if
    /// cancellation won the race (spec §5 "cancellation observed by
    /// watch-signal waiters via an external cancellation token").
    pub async fn changed_or_cancelled(&self, cancel: &CancellationToken) -> bool {
        if self.is_closed() {
            return true;
        }
        tokio::select! {
            _ = self.changed() => true,
            _ = cancel.cancelled() => false,
        }
    }
}
