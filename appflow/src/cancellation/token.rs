//! Shutdown signal shared by triggers and their workers.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// A callback type for shutdown notifications.
pub type ShutdownCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    requested: AtomicBool,
    reason: RwLock<Option<String>>,
    callbacks: RwLock<Vec<ShutdownCallback>>,
    notify: Notify,
}

/// A cloneable token that signals graceful shutdown.
///
/// Shutdown is idempotent; only the first reason is kept. Clones observe
/// the same signal.
#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

impl ShutdownToken {
    /// Creates a token that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown with a reason.
    ///
    /// Callbacks run immediately; a panicking callback is logged and
    /// suppressed.
    pub fn shutdown(&self, reason: impl Into<String>) {
        if self
            .inner
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let reason = reason.into();
        info!(reason = %reason, "shutdown requested");
        *self.inner.reason.write() = Some(reason);

        for callback in self.inner.callbacks.read().iter() {
            run_callback(callback.as_ref());
        }
        self.inner.notify.notify_waiters();
    }

    /// Registers a callback to run on shutdown.
    ///
    /// If shutdown was already requested, the callback runs immediately.
    pub fn on_shutdown<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.is_shutdown() {
            run_callback(&callback);
        } else {
            self.inner.callbacks.write().push(Box::new(callback));
        }
    }

    /// Returns whether shutdown has been requested.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Returns the shutdown reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }

    /// Completes once shutdown has been requested.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_shutdown() {
                return;
            }
            notified.await;
        }
    }
}

fn run_callback(callback: &(dyn Fn() + Send + Sync)) {
    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(callback)) {
        warn!("shutdown callback panicked: {:?}", panic);
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("shutdown", &self.is_shutdown())
            .field("reason", &self.reason())
            .finish()
    }
}
