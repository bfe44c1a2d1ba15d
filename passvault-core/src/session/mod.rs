//! Authentication session state machine.
//!
//! ```text
//! Uninitialized ─┐
//!                ├─ setup ──────────────► Unlocked
//! AwaitingSetup ─┘                          │  ▲
//!                                logout /   │  │ verify
//!                              force_lock   ▼  │
//!                                          Locked (failed_attempts, lockout_until)
//! ```
//!
//! A process always starts `Uninitialized`; `initialize` resolves it to
//! `AwaitingSetup` or `Locked`, never to `Unlocked`.

pub mod autolock;
pub mod idle;
#[cfg(test)]
mod tests;

use crate::clock::Clock;
use crate::gateway::{BackendGateway, GatewayError};
use crate::lockout::{LockoutConfig, LockoutTracker};
use crate::{PassVaultError, Result, MIN_MASTER_PASSWORD_LEN};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Authentication phase of the running client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Not yet resolved against the backend
    Uninitialized,
    /// No master password exists; only `setup` leaves this phase
    AwaitingSetup,
    /// Master password exists but has not been verified this process
    Locked,
    Unlocked,
}

/// Observable authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub phase: AuthPhase,
    /// A gateway call is outstanding
    pub loading: bool,
    pub last_error: Option<String>,
    lockout: LockoutTracker,
}

impl AuthSession {
    fn new() -> Self {
        Self {
            phase: AuthPhase::Uninitialized,
            loading: false,
            last_error: None,
            lockout: LockoutTracker::new(),
        }
    }

    pub fn failed_attempts(&self) -> u32 {
        self.lockout.failed_attempts()
    }

    pub fn lockout_until(&self) -> Option<DateTime<Utc>> {
        self.lockout.lockout_until()
    }

    pub fn is_unlocked(&self) -> bool {
        self.phase == AuthPhase::Unlocked
    }

    /// Setup screen should be shown
    pub fn needs_setup(&self) -> bool {
        matches!(self.phase, AuthPhase::Uninitialized | AuthPhase::AwaitingSetup)
    }
}

/// Format a countdown in seconds as `m:ss`
pub fn format_countdown(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn ceil_seconds(duration: Duration) -> i64 {
    (duration.num_milliseconds() + 999) / 1000
}

/// Owns the single [`AuthSession`] of a client process.
///
/// All mutation goes through the operations below; readers take a
/// [`snapshot`](Self::snapshot) or [`subscribe`](Self::subscribe).
pub struct AuthSessionMachine {
    gateway: Arc<dyn BackendGateway>,
    clock: Arc<dyn Clock>,
    config: LockoutConfig,
    state: watch::Sender<AuthSession>,
}

impl AuthSessionMachine {
    pub fn new(gateway: Arc<dyn BackendGateway>, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(gateway, clock, LockoutConfig::default())
    }

    pub fn with_config(
        gateway: Arc<dyn BackendGateway>,
        clock: Arc<dyn Clock>,
        config: LockoutConfig,
    ) -> Self {
        let (state, _rx) = watch::channel(AuthSession::new());
        Self {
            gateway,
            clock,
            config,
            state,
        }
    }

    pub fn snapshot(&self) -> AuthSession {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSession> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> AuthPhase {
        self.state.borrow().phase
    }

    pub fn is_unlocked(&self) -> bool {
        self.phase() == AuthPhase::Unlocked
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Resolve the phase from whether the backend has a master password.
    ///
    /// On gateway failure the phase stays as it was and the caller must
    /// retry.
    pub async fn initialize(&self) -> Result<AuthPhase> {
        self.begin();

        let has_master = match self.gateway.wait_ready().await {
            Ok(()) => self.gateway.has_master_password().await,
            Err(e) => Err(e),
        };

        match has_master {
            Ok(has_master) => {
                let phase = if has_master {
                    AuthPhase::Locked
                } else {
                    AuthPhase::AwaitingSetup
                };
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.phase = phase;
                });
                info!("Auth session initialized: {:?}", phase);
                Ok(phase)
            }
            Err(e) => {
                error!("Auth session initialization failed: {}", e);
                Err(self.fail(e.into()))
            }
        }
    }

    /// Create the master password and unlock.
    ///
    /// Passwords shorter than [`MIN_MASTER_PASSWORD_LEN`] never reach the
    /// backend.
    pub async fn setup(&self, password: &str) -> Result<()> {
        if password.chars().count() < MIN_MASTER_PASSWORD_LEN {
            return Err(self.reject(PassVaultError::Validation(format!(
                "Master password must be at least {} characters",
                MIN_MASTER_PASSWORD_LEN
            ))));
        }

        self.begin();
        let created = match self.gateway.wait_ready().await {
            Ok(()) => self.gateway.setup_master_password(password).await,
            Err(e) => Err(e),
        };

        match created {
            Ok(true) => {
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.phase = AuthPhase::Unlocked;
                    s.lockout.clear();
                });
                info!("Master password created, vault unlocked");
                Ok(())
            }
            Ok(false) => Err(self.fail(
                GatewayError::Validation("Master password setup was declined".to_string()).into(),
            )),
            Err(e) => {
                warn!("Master password setup failed: {}", e);
                Err(self.fail(e.into()))
            }
        }
    }

    /// Check the master password and unlock on success.
    ///
    /// Fails immediately while a lockout is active, without touching the
    /// backend or the attempt counter. Already unlocked is a no-op.
    pub async fn verify(&self, password: &str) -> Result<()> {
        self.expire_lockout();

        let session = self.snapshot();
        if session.phase == AuthPhase::Unlocked {
            debug!("Unlock requested while already unlocked");
            return Ok(());
        }
        if let Some(remaining) = session.lockout.remaining(self.clock.now()) {
            warn!("Unlock attempt rejected, lockout active");
            return Err(self.reject(PassVaultError::LockedOut(ceil_seconds(remaining))));
        }
        if session.needs_setup() {
            return Err(self.reject(PassVaultError::validation(
                "No master password has been set up",
            )));
        }
        if password.is_empty() {
            return Err(self.reject(PassVaultError::validation("Master password is required")));
        }

        self.begin();
        let verified = match self.gateway.wait_ready().await {
            Ok(()) => self.gateway.verify_master_password(password).await,
            Err(e) => Err(e),
        };

        match verified {
            Ok(true) => {
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.phase = AuthPhase::Unlocked;
                    s.lockout.clear();
                });
                info!("Vault unlocked");
                Ok(())
            }
            Ok(false) => {
                let now = self.clock.now();
                let config = self.config;
                let mut started = false;
                self.state.send_modify(|s| {
                    started = s.lockout.record_failure(&config, now);
                    s.loading = false;
                });

                let attempts = self.state.borrow().lockout.failed_attempts();
                if started {
                    warn!(
                        "Too many failed unlock attempts ({}), locked out for {}s",
                        attempts, config.lockout_seconds
                    );
                } else {
                    warn!("Invalid master password (attempt {})", attempts);
                }
                Err(self.reject(PassVaultError::InvalidPassword {
                    remaining_attempts: self.attempts_remaining(),
                }))
            }
            Err(e) => {
                error!("Master password verification failed: {}", e);
                Err(self.fail(e.into()))
            }
        }
    }

    /// Clear the backend session and lock.
    ///
    /// The local transition to `Locked` happens whatever the backend says;
    /// a failed logout call is still returned so it can be shown.
    pub async fn logout(&self) -> Result<()> {
        self.begin();
        let result = self.gateway.logout().await;

        self.state.send_modify(|s| {
            s.loading = false;
            s.phase = AuthPhase::Locked;
            s.last_error = result.as_ref().err().map(|e| e.to_string());
        });

        match result {
            Ok(()) => {
                info!("Logged out, vault locked");
                Ok(())
            }
            Err(e) => {
                warn!("Logout call failed, vault locked locally: {}", e);
                Err(e.into())
            }
        }
    }

    /// Lock without counting a failed attempt.
    ///
    /// Used by the idle timer. Only `Unlocked` is affected; the attempt
    /// counter and lockout deadline are left alone. The backend logout that
    /// follows is best effort. Returns whether a lock happened.
    pub async fn force_lock(&self) -> bool {
        let locked = self.state.send_if_modified(|s| {
            if s.phase == AuthPhase::Unlocked {
                s.phase = AuthPhase::Locked;
                true
            } else {
                false
            }
        });
        if !locked {
            return false;
        }

        info!("Vault locked");
        if let Err(e) = self.gateway.logout().await {
            warn!("Ignoring logout failure on forced lock: {}", e);
        }
        true
    }

    /// End an elapsed lockout. Returns whether one was cleared.
    pub fn expire_lockout(&self) -> bool {
        let now = self.clock.now();
        let cleared = self.state.send_if_modified(|s| {
            let cleared = s.lockout.expire(now);
            if cleared {
                s.last_error = None;
            }
            cleared
        });
        if cleared {
            info!("Lockout expired, unlock attempts allowed again");
        }
        cleared
    }

    pub fn is_locked_out(&self) -> bool {
        self.state.borrow().lockout.is_locked_out(self.clock.now())
    }

    /// Time left on an active lockout
    pub fn lockout_remaining(&self) -> Option<Duration> {
        self.state.borrow().lockout.remaining(self.clock.now())
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.state.borrow().lockout.attempts_remaining(&self.config)
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.last_error.take().is_some());
    }

    fn begin(&self) {
        self.state.send_modify(|s| {
            s.loading = true;
            s.last_error = None;
        });
    }

    /// Finish an outstanding call with an error
    fn fail(&self, err: PassVaultError) -> PassVaultError {
        self.state.send_modify(|s| {
            s.loading = false;
            s.last_error = Some(err.to_string());
        });
        err
    }

    /// Report an error for a call that never started
    fn reject(&self, err: PassVaultError) -> PassVaultError {
        self.state.send_modify(|s| s.last_error = Some(err.to_string()));
        err
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(300), "5:00");
        assert_eq!(format_countdown(61), "1:01");
        assert_eq!(format_countdown(9), "0:09");
        assert_eq!(format_countdown(-4), "0:00");
    }

    #[test]
    fn test_ceil_seconds() {
        assert_eq!(ceil_seconds(Duration::milliseconds(1)), 1);
        assert_eq!(ceil_seconds(Duration::seconds(300)), 300);
        assert_eq!(ceil_seconds(Duration::milliseconds(299_500)), 300);
    }
}
