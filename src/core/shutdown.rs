//! Cooperative shutdown signal shared by the background loops

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// A shutdown signal that supports interruptible waits.
///
/// Loops check [`ShutdownSignal::is_shutdown`] at the top of every iteration
/// and sleep through [`ShutdownSignal::wait`], which returns early as soon as
/// shutdown is triggered.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    shutdown: AtomicBool,
    notify: Notify,
}

impl ShutdownSignal {
    /// Create a new shutdown signal in the non-shutdown state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the shutdown signal, waking all waiting tasks.
    pub fn trigger(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Check if shutdown has been triggered.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Wait for the specified duration or until shutdown is triggered.
    ///
    /// Returns `true` if shutdown was triggered, `false` if the wait completed normally.
    pub async fn wait(&self, duration: Duration) -> bool {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register before re-checking the flag so a trigger in between is not lost
        notified.as_mut().enable();

        if self.is_shutdown() {
            return true;
        }

        tokio::select! {
            _ = notified => true,
            _ = tokio::time::sleep(duration) => self.is_shutdown(),
        }
    }
}
