//! Counting backend trait for abstracting in-process and shared stores.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::counter::WindowCount;

/// Failure talking to a counting backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("backend timed out after {0:?}")]
    Timeout(Duration),
}

/// Atomic increment-and-get keyed by string.
///
/// Implementations must apply the increment and read the post-increment value
/// as one atomic step per key, and fix the window expiry on the first write of
/// a window. An increment that has been applied is final even if the calling
/// future is dropped before it observes the result.
#[async_trait]
pub trait CounterBackend: Send + Sync {
    /// Record one occurrence for `key`, opening a window of length `window`
    /// if none is active.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, BackendError>;
}

#[async_trait]
impl<B: CounterBackend + ?Sized> CounterBackend for std::sync::Arc<B> {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, BackendError> {
        (**self).increment(key, window).await
    }
}
