//! # Subscription: idempotent cancel handle.
//!
//! Every `subscribe` call returns a [`Subscription`]. Cancelling it flips a
//! [`CancellationToken`] first (lock-free, always wins against in-flight
//! producers that check it) and then runs an optional cleanup hook at most
//! once.
//!
//! ## Rules
//! - `cancel` is idempotent; the cleanup hook runs on the first call only.
//! - Dropping a `Subscription` does **not** cancel it. The join engine stores
//!   upstream subscriptions for the lifetime of a run and cancels them
//!   explicitly on teardown.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

type Cleanup = Box<dyn FnOnce() + Send>;

/// Idempotent handle over one subscription.
pub struct Subscription {
    token: CancellationToken,
    cleanup: Mutex<Option<Cleanup>>,
}

impl Subscription {
    /// A subscription whose cancellation is observed solely through its token.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            cleanup: Mutex::new(None),
        }
    }

    /// A subscription that additionally runs `cleanup` on first cancel.
    pub fn with_cleanup(token: CancellationToken, cleanup: impl FnOnce() + Send + 'static) -> Self {
        Self {
            token,
            cleanup: Mutex::new(Some(Box::new(cleanup))),
        }
    }

    /// Cancels the subscription. Safe to call any number of times.
    ///
    /// The token is cancelled before the cleanup hook runs, so producers
    /// observing the token stop even if cleanup cannot make progress yet.
    pub fn cancel(&self) {
        self.token.cancel();
        let hook = self
            .cleanup
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(hook) = hook {
            hook();
        }
    }

    /// True once [`cancel`](Subscription::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The token producers watch to stop delivery.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
