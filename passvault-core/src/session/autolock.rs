//! Inactivity bookkeeping for auto-lock.

use std::time::Duration;
use tokio::time::Instant;

/// Default inactivity timeout in minutes
pub const DEFAULT_TIMEOUT_MINUTES: u32 = 15;

/// Point-in-time view of the auto-lock timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimerState {
    pub last_activity_at: Instant,
    pub timeout_minutes: u32,
    pub enabled: bool,
}

/// Tracks the last user activity against an inactivity timeout
#[derive(Debug)]
pub struct AutoLockManager {
    last_activity: Instant,
    timeout_minutes: u32,
    enabled: bool,
}

impl AutoLockManager {
    /// Create an enabled manager; `timeout_minutes` of zero is treated as one
    pub fn new(timeout_minutes: u32) -> Self {
        Self {
            last_activity: Instant::now(),
            timeout_minutes: timeout_minutes.max(1),
            enabled: true,
        }
    }

    /// Update the last activity timestamp
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Check if the vault should be locked
    pub fn should_lock(&self) -> bool {
        if !self.enabled {
            return false;
        }
        self.last_activity.elapsed() >= self.timeout()
    }

    /// Enable auto-lock
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Disable auto-lock; the last activity time is kept
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Change the timeout; checked against on the next evaluation
    pub fn set_timeout_minutes(&mut self, minutes: u32) {
        self.timeout_minutes = minutes.max(1);
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_minutes) * 60)
    }

    /// Get the time until lock
    pub fn time_until_lock(&self) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        Some(self.timeout().saturating_sub(self.last_activity.elapsed()))
    }

    pub fn state(&self) -> SessionTimerState {
        SessionTimerState {
            last_activity_at: self.last_activity,
            timeout_minutes: self.timeout_minutes,
            enabled: self.enabled,
        }
    }
}

impl Default for AutoLockManager {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MINUTES)
    }
}
