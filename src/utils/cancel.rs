//! Cancellation utilities
//!
//! Provides the cancellation handle shared between an operation and the
//! handles given out to callers.

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
///
/// Cancellation is advisory: the pipeline observes it at fixed checkpoints
/// and never aborts an exchange that is already in flight.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Create a new cancel handle.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Create a standalone cancel handle that can be shared across tasks.
pub fn new_cancel_handle() -> CancelHandle {
    CancelHandle::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation() {
        let handle = new_cancel_handle();
        let other = handle.clone();
        assert!(!other.is_cancelled());
        handle.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_after_cancel() {
        let handle = CancelHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        handle.cancel();
        tokio::time::timeout(std::time::Duration::from_millis(200), task)
            .await
            .expect("cancel should wake the waiting task")
            .expect("task ok");
    }

    #[test]
    fn cancelled_future_is_pending_until_cancel() {
        let handle = CancelHandle::new();
        let mut cancelled = tokio_test::task::spawn(handle.cancelled());
        tokio_test::assert_pending!(cancelled.poll());
        handle.cancel();
        assert!(cancelled.is_woken());
        tokio_test::assert_ready!(cancelled.poll());
    }
}
