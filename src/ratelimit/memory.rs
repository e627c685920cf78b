//! In-process counting backend.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::backend::{BackendError, CounterBackend};
use super::clock::{Clock, SystemClock};
use super::counter::{WindowCount, WindowCounter};

/// Counting backend that keeps fixed-window counters in a sharded map.
///
/// Each increment runs under the write lock of the key's shard, so the
/// reset-if-expired, increment and read happen as one step and concurrent
/// callers for the same key each observe a distinct count. Keys in other
/// shards are unaffected. Expired counters are reset lazily on access and
/// removed by [`InMemoryBackend::purge_expired`].
#[derive(Debug)]
pub struct InMemoryBackend<C: Clock = SystemClock> {
    counters: DashMap<String, WindowCounter>,
    clock: C,
}

impl InMemoryBackend<SystemClock> {
    /// Create a backend driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InMemoryBackend<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InMemoryBackend<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
        }
    }

    fn increment_now(&self, key: &str, window: Duration) -> WindowCount {
        let now = self.clock.now();

        // Fast path avoids allocating the key for counters that already exist.
        if let Some(mut counter) = self.counters.get_mut(key) {
            return counter.hit(now, window);
        }

        let mut counter = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| {
                debug!(key = %key, window = ?window, "Creating new window counter");
                WindowCounter::new(now, window)
            });
        counter.hit(now, window)
    }

    /// Count in the current window for `key`, if a counter exists.
    pub fn current_count(&self, key: &str) -> Option<u64> {
        let now = self.clock.now();
        self.counters.get(key).map(|c| c.current_count(now))
    }

    /// Remove every counter whose window has expired.
    ///
    /// Returns the number of counters removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| !counter.is_expired(now));
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(removed, remaining = self.counters.len(), "Purged expired counters");
        }
        removed
    }

    /// Get the number of tracked keys.
    pub fn counter_count(&self) -> usize {
        self.counters.len()
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }
}

impl<C: Clock + 'static> InMemoryBackend<C> {
    /// Spawn a task that purges expired counters every `interval`.
    ///
    /// The task holds only a weak reference and exits once the backend is
    /// dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let backend: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(backend) = backend.upgrade() else {
                    debug!("Counter sweeper stopping, backend dropped");
                    break;
                };
                backend.purge_expired();
            }
        })
    }
}

#[async_trait]
impl<C: Clock> CounterBackend for InMemoryBackend<C> {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, BackendError> {
        let observed = self.increment_now(key, window);
        trace!(key = %key, count = observed.count, "Incremented counter");
        Ok(observed)
    }
}
