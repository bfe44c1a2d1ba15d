//! Password Vault Client Core
//!
//! This library provides the client-side control layer of a local password
//! vault: the authentication state machine with failed-attempt lockout, the
//! inactivity auto-lock timer, and an observable mirror of vault entries
//! kept in sync with a trusted backend reached through [`BackendGateway`].

pub mod categories;
pub mod clock;
pub mod context;
pub mod gateway;
pub mod lockout;
pub mod models;
pub mod notify;
pub mod platform;
pub mod preferences;
pub mod session;
pub mod store;

pub use categories::CategoryStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{VaultContext, VaultContextBuilder};
pub use gateway::{BackendGateway, GatewayError, InMemoryGateway, ReadinessGate};
pub use lockout::{LockoutConfig, LockoutTracker, DEFAULT_MAX_ATTEMPTS};
pub use models::{Category, CategoryDraft, EntryDraft, EntryId, EntryPatch, VaultEntry};
pub use notify::{Confirmer, ConfirmRequest, Notification, Notifier, Severity};
pub use preferences::{
    FileStorage, MemoryStorage, PreferenceStorage, Preferences, PreferencesPatch, PreferencesStore,
};
pub use session::idle::IdleLockTimer;
pub use session::{AuthPhase, AuthSession, AuthSessionMachine};
pub use store::{NavigationCounts, VaultStore, VaultStoreSnapshot};

use thiserror::Error;

/// Minimum accepted master password length
pub const MIN_MASTER_PASSWORD_LEN: usize = 8;

/// Result type for vault client operations
pub type Result<T> = std::result::Result<T, PassVaultError>;

/// General error type for vault client operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassVaultError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Validation(String),

    #[error("Invalid master password")]
    InvalidPassword { remaining_attempts: u32 },

    #[error("Too many failed attempts. Try again in {}", session::format_countdown(*.0))]
    LockedOut(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Preferences error: {0}")]
    Preferences(String),
}

/// How an error should be surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend unreachable or not ready; blocks every operation
    Environment,
    /// Local pre-gateway check failed; shown next to the offending field
    Validation,
    /// Wrong password or active lockout
    Authentication,
    /// Backend rejected the call; reported through the notifier
    Operation,
}

impl PassVaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Gateway(GatewayError::Unavailable(_)) => ErrorKind::Environment,
            Self::Gateway(_) | Self::NotFound(_) | Self::Preferences(_) => ErrorKind::Operation,
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidPassword { .. } | Self::LockedOut(_) => ErrorKind::Authentication,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let unreachable = PassVaultError::from(GatewayError::Unavailable("down".into()));
        assert_eq!(unreachable.kind(), ErrorKind::Environment);

        let missing = PassVaultError::from(GatewayError::NotFound("abc".into()));
        assert_eq!(missing.kind(), ErrorKind::Operation);

        assert_eq!(
            PassVaultError::validation("too short").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            PassVaultError::InvalidPassword { remaining_attempts: 2 }.kind(),
            ErrorKind::Authentication
        );
        assert_eq!(PassVaultError::LockedOut(30).kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_lockout_message_distinct_from_invalid_password() {
        let invalid = PassVaultError::InvalidPassword { remaining_attempts: 0 }.to_string();
        let locked = PassVaultError::LockedOut(299).to_string();

        assert_eq!(invalid, "Invalid master password");
        assert_eq!(locked, "Too many failed attempts. Try again in 4:59");
    }
}
