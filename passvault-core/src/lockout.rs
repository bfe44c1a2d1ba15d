//! Failed attempt lockout to slow down master password guessing

use chrono::{DateTime, Duration, Utc};

/// Default maximum failed attempts before lockout
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default lockout duration in seconds (5 minutes)
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 300;

/// Lockout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Consecutive failed attempts that trigger a lockout
    pub max_attempts: u32,
    /// How long verification stays blocked once triggered
    pub lockout_seconds: i64,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
        }
    }
}

impl LockoutConfig {
    pub fn lockout_duration(&self) -> Duration {
        Duration::seconds(self.lockout_seconds)
    }
}

/// Client-local failed attempt counter and lockout deadline.
///
/// Purely time based. `expire` is the only place a lockout ends, so the
/// lazy check before a verification and the periodic check from the idle
/// timer always agree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutTracker {
    failed_attempts: u32,
    lockout_until: Option<DateTime<Utc>>,
}

impl LockoutTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn lockout_until(&self) -> Option<DateTime<Utc>> {
        self.lockout_until
    }

    /// Record a failed verification.
    ///
    /// Returns `true` if this failure started a lockout.
    pub fn record_failure(&mut self, config: &LockoutConfig, now: DateTime<Utc>) -> bool {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        if self.failed_attempts >= config.max_attempts && self.lockout_until.is_none() {
            self.lockout_until = Some(now + config.lockout_duration());
            return true;
        }
        false
    }

    /// Forget all failures (successful unlock)
    pub fn clear(&mut self) {
        self.failed_attempts = 0;
        self.lockout_until = None;
    }

    /// End an elapsed lockout.
    ///
    /// Once `now >= lockout_until` the counter resets to zero. Returns
    /// `true` if a lockout was cleared by this call.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        match self.lockout_until {
            Some(until) if now >= until => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    /// Whether verification is currently blocked
    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_until.is_some_and(|until| now < until)
    }

    /// Time left until the lockout ends
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let until = self.lockout_until?;
        let remaining = until - now;
        (remaining > Duration::zero()).then_some(remaining)
    }

    /// Attempts left before a lockout triggers
    pub fn attempts_remaining(&self, config: &LockoutConfig) -> u32 {
        config.max_attempts.saturating_sub(self.failed_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockout_config_default() {
        let config = LockoutConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.lockout_duration(), Duration::minutes(5));
    }

    #[test]
    fn test_no_lockout_below_max_attempts() {
        let config = LockoutConfig::default();
        let now = Utc::now();
        let mut tracker = LockoutTracker::new();

        for _ in 0..4 {
            assert!(!tracker.record_failure(&config, now));
        }

        assert_eq!(tracker.failed_attempts(), 4);
        assert_eq!(tracker.attempts_remaining(&config), 1);
        assert!(!tracker.is_locked_out(now));
        assert!(tracker.remaining(now).is_none());
    }

    #[test]
    fn test_lockout_at_max_attempts() {
        let config = LockoutConfig::default();
        let now = Utc::now();
        let mut tracker = LockoutTracker::new();

        for _ in 0..4 {
            tracker.record_failure(&config, now);
        }
        assert!(tracker.record_failure(&config, now));

        assert!(tracker.is_locked_out(now));
        assert_eq!(tracker.lockout_until(), Some(now + Duration::minutes(5)));
        assert_eq!(tracker.remaining(now), Some(Duration::minutes(5)));
        assert_eq!(tracker.attempts_remaining(&config), 0);
    }

    #[test]
    fn test_expire_resets_counter() {
        let config = LockoutConfig::default();
        let now = Utc::now();
        let mut tracker = LockoutTracker::new();
        for _ in 0..5 {
            tracker.record_failure(&config, now);
        }

        assert!(!tracker.expire(now + Duration::seconds(299)));
        assert_eq!(tracker.failed_attempts(), 5);

        assert!(tracker.expire(now + Duration::seconds(300)));
        assert_eq!(tracker.failed_attempts(), 0);
        assert!(tracker.lockout_until().is_none());
        assert!(!tracker.is_locked_out(now + Duration::seconds(300)));
    }

    #[test]
    fn test_clear_failed_attempts() {
        let config = LockoutConfig::default();
        let mut tracker = LockoutTracker::new();
        tracker.record_failure(&config, Utc::now());
        tracker.record_failure(&config, Utc::now());

        tracker.clear();
        assert_eq!(tracker, LockoutTracker::default());
    }
}
