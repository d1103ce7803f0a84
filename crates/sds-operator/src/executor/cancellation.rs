//! Cancellation support for running executions.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Token for cancelling a running execution.
///
/// This token uses an atomic boolean internally, making it safe to clone
/// and share across threads. Call [`cancel()`](Self::cancel) from any thread
/// to stop the engine process; the executor then returns
/// [`OperatorError::Cancelled`](crate::error::OperatorError::Cancelled).
///
/// # Example
///
/// ```rust,ignore
/// use sds_operator::{CancellationToken, ProcessExecutor};
/// use std::thread;
/// use std::time::Duration;
///
/// let token = CancellationToken::new();
/// let token_for_cancel = token.clone();
///
/// thread::spawn(move || {
///     thread::sleep(Duration::from_secs(60));
///     token_for_cancel.cancel();
/// });
///
/// let executor = ProcessExecutor::builder()
///     .cancellation_token(token)
///     .build()?;
///
/// match imputed.compute(&executor) {
///     Err(e) if e.is_cancelled() => println!("Engine run was cancelled"),
///     Ok(result) => println!("Done"),
///     Err(e) => println!("Failed: {}", e),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// This method is thread-safe and can be called from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if [`cancel()`](Self::cancel) has been called on this
    /// token or any of its clones.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another execution.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_default_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();

        token1.cancel();

        assert!(token1.is_cancelled());
        assert!(token2.is_cancelled());
    }

    #[test]
    fn test_cancellation_token_reset() {
        let token = CancellationToken::new();
        token.cancel();
        token.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancellation_across_threads() {
        let token = CancellationToken::new();
        let remote = token.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(token.is_cancelled());
    }
}
