//! Periodic supervisor that auto-locks the session after inactivity
//!
//! One timer exists per session. Each tick it ends any elapsed lockout so
//! the lock screen unblocks on its own, then forces a lock if the session
//! is unlocked and idle for longer than the configured timeout.

use super::autolock::{AutoLockManager, SessionTimerState};
use super::{AuthPhase, AuthSessionMachine};
use crate::{PassVaultError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Default tick period
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Auto-lock supervisor for an [`AuthSessionMachine`]
pub struct IdleLockTimer {
    session: Arc<AuthSessionMachine>,
    manager: Mutex<AutoLockManager>,
    last_phase: Mutex<AuthPhase>,
}

impl IdleLockTimer {
    pub fn new(session: Arc<AuthSessionMachine>, timeout_minutes: u32) -> Self {
        let phase = session.phase();
        Self {
            session,
            manager: Mutex::new(AutoLockManager::new(timeout_minutes)),
            last_phase: Mutex::new(phase),
        }
    }

    fn manager(&self) -> MutexGuard<'_, AutoLockManager> {
        self.manager.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reset the inactivity clock (user input, navigation, ...)
    pub fn record_activity(&self) {
        self.manager().record_activity();
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.manager().set_enabled(enabled);
        debug!("Auto-lock {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Change the timeout; applies from the next tick
    pub fn set_timeout_minutes(&self, minutes: u32) -> Result<()> {
        if minutes == 0 {
            return Err(PassVaultError::validation(
                "Auto-lock timeout must be at least one minute",
            ));
        }
        self.manager().set_timeout_minutes(minutes);
        Ok(())
    }

    pub fn state(&self) -> SessionTimerState {
        self.manager().state()
    }

    pub fn time_until_lock(&self) -> Option<Duration> {
        self.manager().time_until_lock()
    }

    /// Run one evaluation. Returns whether the session was locked.
    pub async fn tick(&self) -> bool {
        self.session.expire_lockout();

        let phase = self.session.phase();
        let idle = {
            let mut manager = self.manager();
            let mut last_phase = self.last_phase.lock().unwrap_or_else(|e| e.into_inner());
            // Time spent on the lock screen does not count as idle time
            if phase == AuthPhase::Unlocked && *last_phase != AuthPhase::Unlocked {
                manager.record_activity();
            }
            *last_phase = phase;
            phase == AuthPhase::Unlocked && manager.should_lock()
        };

        if !idle {
            return false;
        }

        warn!("Auto-locking vault due to inactivity");
        let locked = self.session.force_lock().await;
        *self.last_phase.lock().unwrap_or_else(|e| e.into_inner()) = self.session.phase();
        locked
    }

    /// Start the background tick loop
    pub fn spawn(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let timer = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // Skip first tick

            loop {
                ticker.tick().await;
                timer.tick().await;
            }
        })
    }
}
