//! # Disposable handle to one backend subscription.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns one live backend subscription.
///
/// Disposing cancels the token and waits for the adapter's read task (if it
/// registered one) so no delivery from this subscription is still running
/// once [`dispose`](Self::dispose) returns.
#[derive(Debug)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    /// Handle that only cancels `cancel` on dispose.
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel, task: None }
    }

    /// Also waits for `task` on dispose.
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Token observed by the adapter's read loop.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// True once dispose was requested.
    pub fn is_disposed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancels the subscription and waits for its read task to finish.
    pub async fn dispose(self) {
        self.cancel.cancel();
        let Some(task) = self.task else {
            return;
        };
        match task.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::warn!(error = %e, "subscription read task panicked"),
        }
    }
}
