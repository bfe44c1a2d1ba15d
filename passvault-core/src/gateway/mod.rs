//! Typed boundary to the trusted vault backend.
//!
//! Every method maps one-to-one onto a backend command:
//!
//! | Command                  | Method                      |
//! |--------------------------|-----------------------------|
//! | `has_master_password`    | [`BackendGateway::has_master_password`] |
//! | `setup_master_password`  | [`BackendGateway::setup_master_password`] |
//! | `verify_master_password` | [`BackendGateway::verify_master_password`] |
//! | `logout`                 | [`BackendGateway::logout`] |
//! | `create_password_entry`  | [`BackendGateway::create_password_entry`] |
//! | `get_all_entries`        | [`BackendGateway::get_all_entries`] |
//! | `get_entry_by_id`        | [`BackendGateway::get_entry_by_id`] |
//! | `update_password_entry`  | [`BackendGateway::update_password_entry`] |
//! | `delete_password_entry`  | [`BackendGateway::delete_password_entry`] |
//! | `search_entries`         | [`BackendGateway::search_entries`] |
//! | `generate_password`      | [`BackendGateway::generate_password`] |
//!
//! Transport is up to the implementor. The core only relies on the
//! semantics documented on each method.

mod generator;
mod memory;
mod readiness;

pub use generator::generate_password;
pub use memory::InMemoryGateway;
pub use readiness::ReadinessGate;

use crate::models::{EntryDraft, EntryId, EntryPatch, VaultEntry};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Result type for gateway commands
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Errors reported by the backend boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Master password is already set")]
    AlreadyInitialized,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Rejected by backend: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Backend command names, used for logging and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    HasMasterPassword,
    SetupMasterPassword,
    VerifyMasterPassword,
    Logout,
    CreatePasswordEntry,
    GetAllEntries,
    GetEntryById,
    UpdatePasswordEntry,
    DeletePasswordEntry,
    SearchEntries,
    GeneratePassword,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Self::HasMasterPassword => "has_master_password",
            Self::SetupMasterPassword => "setup_master_password",
            Self::VerifyMasterPassword => "verify_master_password",
            Self::Logout => "logout",
            Self::CreatePasswordEntry => "create_password_entry",
            Self::GetAllEntries => "get_all_entries",
            Self::GetEntryById => "get_entry_by_id",
            Self::UpdatePasswordEntry => "update_password_entry",
            Self::DeletePasswordEntry => "delete_password_entry",
            Self::SearchEntries => "search_entries",
            Self::GeneratePassword => "generate_password",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Contract the client core requires from the backend
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Resolves once the backend can accept commands.
    ///
    /// Called before the first command of a session or store fetch.
    async fn wait_ready(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn has_master_password(&self) -> GatewayResult<bool>;

    /// Fails with [`GatewayError::AlreadyInitialized`] if a master password exists
    async fn setup_master_password(&self, password: &str) -> GatewayResult<bool>;

    /// `Ok(false)` on mismatch; errors only when the backend is unreachable
    async fn verify_master_password(&self, password: &str) -> GatewayResult<bool>;

    /// Best effort; the client locks regardless of the outcome
    async fn logout(&self) -> GatewayResult<()>;

    async fn create_password_entry(&self, draft: &EntryDraft) -> GatewayResult<EntryId>;

    async fn get_all_entries(&self) -> GatewayResult<Vec<VaultEntry>>;

    async fn get_entry_by_id(&self, id: &EntryId) -> GatewayResult<VaultEntry>;

    async fn update_password_entry(&self, id: &EntryId, patch: &EntryPatch) -> GatewayResult<()>;

    async fn delete_password_entry(&self, id: &EntryId) -> GatewayResult<()>;

    async fn search_entries(&self, query: &str) -> GatewayResult<Vec<VaultEntry>>;

    async fn generate_password(&self, length: usize, include_symbols: bool)
        -> GatewayResult<String>;
}
