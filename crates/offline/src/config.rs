//! Sync policy configuration.

use std::time::Duration;

/// Default number of failed attempts before a mutation is dead-lettered.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default cadence of the periodic trigger.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_millis(30_000);

/// Default upper bound for a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Default number of dead-lettered mutations kept for inspection.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 100;

/// Retry, scheduling and retention policy for the offline queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Failed attempts after which a mutation leaves the queue.
    pub max_retries: u32,
    /// Periodic trigger cadence while online.
    pub sync_interval: Duration,
    /// Per-call backend timeout; expiry counts as a transient failure.
    pub backend_timeout: Duration,
    /// Dead-letter history size (oldest evicted first).
    pub dead_letter_capacity: usize,
    /// Dead-letter permanent backend errors on first occurrence instead of retrying them.
    pub dead_letter_permanent: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            sync_interval: DEFAULT_SYNC_INTERVAL,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            dead_letter_permanent: true,
        }
    }
}

impl SyncConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.dead_letter_capacity = capacity.max(1);
        self
    }

    pub fn with_dead_letter_permanent(mut self, enabled: bool) -> Self {
        self.dead_letter_permanent = enabled;
        self
    }

    /// Whether a mutation with `retry_count` failures has exhausted its budget.
    pub fn retries_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = SyncConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.sync_interval, Duration::from_secs(30));
        assert_eq!(config.dead_letter_capacity, 100);
        assert!(config.dead_letter_permanent);
    }

    #[test]
    fn retries_exhausted_at_max() {
        let config = SyncConfig::default().with_max_retries(3);
        assert!(!config.retries_exhausted(2));
        assert!(config.retries_exhausted(3));
        assert!(config.retries_exhausted(4));
    }

    #[test]
    fn zero_limits_are_clamped() {
        let config = SyncConfig::default()
            .with_max_retries(0)
            .with_dead_letter_capacity(0);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.dead_letter_capacity, 1);
    }
}
