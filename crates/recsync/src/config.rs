//! Engine configuration.

use std::time::Duration;

/// Page size used when none is given.
pub const DEFAULT_INTERVAL: u32 = 25;

/// Largest page size the engine will request.
pub const MAX_INTERVAL: u32 = 500;

/// Bounds on server-directed retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per operation, the first call included.
    pub max_attempts: u32,
    /// Ceiling applied to the delay the service asks for.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            max_delay: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// Retry for as long as the service keeps sending a hint.
    pub fn unbounded() -> Self {
        Self {
            max_attempts: u32::MAX,
            max_delay: Duration::MAX,
        }
    }

    /// Never retry.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// The delay before the next attempt, given the service's hint and the
    /// number of attempts already made.
    ///
    /// Returns `None` when there is no hint or the attempt budget is spent.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use recsync::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(Some(Duration::from_secs(5)), 1), Some(Duration::from_secs(5)));
    /// assert_eq!(policy.delay_for(None, 1), None);
    /// assert_eq!(policy.delay_for(Some(Duration::from_secs(5)), 8), None);
    /// ```
    pub fn delay_for(&self, hint: Option<Duration>, attempt: u32) -> Option<Duration> {
        let hint = hint?;
        if attempt >= self.max_attempts {
            return None;
        }
        Some(hint.min(self.max_delay))
    }
}

/// Configuration for a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Records requested per page.
    pub interval: u32,
    /// Queue writes locally when offline instead of failing.
    pub offline_support: bool,
    /// Flush pending work in the background after each fetch.
    pub flush_on_fetch: bool,
    /// Retry bounds.
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl SyncConfig {
    /// A configuration with page size `interval`, clamped to
    /// `1..=MAX_INTERVAL`.
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.clamp(1, MAX_INTERVAL),
            offline_support: true,
            flush_on_fetch: true,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_offline_support(mut self, enabled: bool) -> Self {
        self.offline_support = enabled;
        self
    }

    pub fn with_flush_on_fetch(mut self, enabled: bool) -> Self {
        self.flush_on_fetch = enabled;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
