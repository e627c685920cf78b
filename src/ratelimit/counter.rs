//! Fixed-window counter and time units.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Unit in which a rule's window length is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[serde(alias = "milliseconds", alias = "ms")]
    Millisecond,
    #[serde(alias = "seconds", alias = "s")]
    Second,
    #[serde(alias = "minutes", alias = "m")]
    Minute,
    #[serde(alias = "hours", alias = "h")]
    Hour,
    #[serde(alias = "days", alias = "d")]
    Day,
}

impl TimeUnit {
    /// Length of one unit in milliseconds.
    pub fn as_millis(&self) -> u64 {
        match self {
            TimeUnit::Millisecond => 1,
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day => 86_400_000,
        }
    }

    /// Get the duration of `length` units, saturating on overflow.
    pub fn duration(&self, length: u64) -> Duration {
        Duration::from_millis(self.as_millis().saturating_mul(length))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
            TimeUnit::Minute => "min",
            TimeUnit::Hour => "h",
            TimeUnit::Day => "d",
        };
        f.write_str(name)
    }
}

/// Occurrence count observed by one increment, plus time left in its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Post-increment count for the current window
    pub count: u64,
    /// Time until the current window expires
    pub resets_in: Duration,
}

/// Counter for a single key within a fixed window.
///
/// The window is anchored to the first hit after the previous window expired.
/// A `WindowCounter` carries no synchronization of its own: callers must hold
/// exclusive access (the backend's map entry lock) across [`WindowCounter::hit`].
#[derive(Debug, Clone, Copy)]
pub struct WindowCounter {
    count: u64,
    expires_at: Instant,
}

impl WindowCounter {
    /// Open an empty window starting at `now`.
    pub fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            expires_at: now + window,
        }
    }

    /// Record one occurrence, starting a fresh window first if this one expired.
    pub fn hit(&mut self, now: Instant, window: Duration) -> WindowCount {
        if self.is_expired(now) {
            self.count = 0;
            self.expires_at = now + window;
        }
        self.count = self.count.saturating_add(1);

        WindowCount {
            count: self.count,
            resets_in: self.expires_at.saturating_duration_since(now),
        }
    }

    /// Count in the current window, zero once it has expired.
    pub fn current_count(&self, now: Instant) -> u64 {
        if self.is_expired(now) {
            0
        } else {
            self.count
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}
