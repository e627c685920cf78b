//! Counting strategies turning occurrence counts into admission decisions.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::backend::{BackendError, CounterBackend};
use super::rules::Rule;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call may proceed.
    Admit {
        /// Occurrences still admitted in the current window
        remaining: u64,
        /// Time until the current window resets
        resets_in: Duration,
    },
    /// The quota for the current window is exhausted.
    Deny {
        /// Post-increment count that exceeded the quota
        count: u64,
        /// Time until the current window resets
        retry_after: Duration,
    },
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit { .. })
    }
}

/// Admission engine consulted once per guarded call.
#[async_trait]
pub trait CountingStrategy: Send + Sync {
    /// Record one occurrence for `rule.key` and decide whether it is admitted.
    async fn check(&self, rule: &Rule) -> Result<Decision, BackendError>;
}

#[async_trait]
impl<S: CountingStrategy + ?Sized> CountingStrategy for Arc<S> {
    async fn check(&self, rule: &Rule) -> Result<Decision, BackendError> {
        (**self).check(rule).await
    }
}

/// Fixed-window counting over a [`CounterBackend`].
///
/// Denied attempts are counted too, so probing an exhausted key costs the
/// caller. Across a window boundary up to `2 * max_count` calls may be
/// admitted in quick succession; this is the usual fixed-window trade-off for
/// constant space and time per key.
#[derive(Debug)]
pub struct FixedWindow<B> {
    backend: Arc<B>,
}

impl<B: CounterBackend> FixedWindow<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B> Clone for FixedWindow<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

#[async_trait]
impl<B: CounterBackend> CountingStrategy for FixedWindow<B> {
    async fn check(&self, rule: &Rule) -> Result<Decision, BackendError> {
        let observed = self.backend.increment(&rule.key, rule.window()).await?;

        trace!(
            key = %rule.key,
            count = observed.count,
            max_count = rule.max_count,
            "Checked fixed window"
        );

        if observed.count <= rule.max_count {
            Ok(Decision::Admit {
                remaining: rule.max_count - observed.count,
                resets_in: observed.resets_in,
            })
        } else {
            debug!(key = %rule.key, count = observed.count, "Fixed window exhausted");
            Ok(Decision::Deny {
                count: observed.count,
                retry_after: observed.resets_in,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::clock::MockClock;
    use crate::ratelimit::{InMemoryBackend, TimeUnit};
    use std::time::Instant;

    fn rule(key: &str, max_count: u64) -> Rule {
        Rule {
            key: key.to_string(),
            window_length: 10,
            time_unit: TimeUnit::Second,
            max_count,
        }
    }

    #[tokio::test]
    async fn test_admits_up_to_max_count_then_denies() {
        let strategy = FixedWindow::new(Arc::new(InMemoryBackend::new()));
        let rule = rule("k", 3);

        for expected_remaining in [2, 1, 0] {
            match strategy.check(&rule).await.unwrap() {
                Decision::Admit { remaining, .. } => assert_eq!(remaining, expected_remaining),
                other => panic!("expected admit, got {:?}", other),
            }
        }

        let denied = strategy.check(&rule).await.unwrap();
        assert!(matches!(denied, Decision::Deny { count: 4, .. }));
    }

    #[tokio::test]
    async fn test_denied_attempts_still_count() {
        let backend = Arc::new(InMemoryBackend::new());
        let strategy = FixedWindow::new(Arc::clone(&backend));
        let rule = rule("k", 1);

        for _ in 0..5 {
            strategy.check(&rule).await.unwrap();
        }
        assert_eq!(backend.current_count("k"), Some(5));
    }

    #[tokio::test]
    async fn test_fresh_window_after_expiry() {
        let clock = MockClock::new(Instant::now());
        let backend = Arc::new(InMemoryBackend::with_clock(clock.clone()));
        let strategy = FixedWindow::new(Arc::clone(&backend));
        let rule = rule("k", 2);

        for _ in 0..4 {
            strategy.check(&rule).await.unwrap();
        }
        assert!(!strategy.check(&rule).await.unwrap().is_admit());

        clock.advance(Duration::from_secs(10));
        let decision = strategy.check(&rule).await.unwrap();
        assert_eq!(
            decision,
            Decision::Admit {
                remaining: 1,
                resets_in: Duration::from_secs(10)
            }
        );
        assert_eq!(backend.current_count("k"), Some(1));
    }

    #[tokio::test]
    async fn test_exhausting_one_key_leaves_another_untouched() {
        let strategy = FixedWindow::new(Arc::new(InMemoryBackend::new()));
        let a = rule("a", 1);
        let b = rule("b", 1);

        assert!(strategy.check(&a).await.unwrap().is_admit());
        assert!(!strategy.check(&a).await.unwrap().is_admit());
        assert!(strategy.check(&b).await.unwrap().is_admit());
    }
}
