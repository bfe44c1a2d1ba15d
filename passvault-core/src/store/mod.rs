//! Reactive mirror of the vault entries held by the backend.
//!
//! Writes are never projected locally. Every successful create, update or
//! delete is followed by a full reload so the snapshot always matches what
//! the backend returned last. Fetch failures keep the previous entries.

mod views;

pub use views::NavigationCounts;

use crate::gateway::{BackendGateway, GatewayResult};
use crate::models::{EntryDraft, EntryId, EntryPatch, VaultEntry};
use crate::{PassVaultError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Accepted range for generated password length
pub const GENERATED_PASSWORD_LEN: std::ops::RangeInclusive<usize> = 4..=128;

/// Observable state of the entry mirror
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultStoreSnapshot {
    /// Entries in the order the backend returned them
    pub entries: Vec<VaultEntry>,
    pub selected: Option<EntryId>,
    /// Filter the current entries were produced by; empty for a full load
    pub query: String,
    pub loading: bool,
    pub last_error: Option<String>,
    in_flight: usize,
}

/// Keeps `loading` raised while a gateway call is outstanding
struct Busy<'a> {
    state: &'a watch::Sender<VaultStoreSnapshot>,
}

impl<'a> Busy<'a> {
    fn enter(state: &'a watch::Sender<VaultStoreSnapshot>) -> Self {
        state.send_modify(|s| {
            s.in_flight += 1;
            s.loading = true;
            s.last_error = None;
        });
        Self { state }
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            s.loading = s.in_flight > 0;
        });
    }
}

/// Entry store backed by a [`BackendGateway`]
pub struct VaultStore {
    gateway: Arc<dyn BackendGateway>,
    state: watch::Sender<VaultStoreSnapshot>,
    /// Held for the duration of a full fetch; keeps the last outcome for joiners
    fetch: Mutex<Option<Result<()>>>,
}

impl VaultStore {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        let (state, _rx) = watch::channel(VaultStoreSnapshot::default());
        Self {
            gateway,
            state,
            fetch: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> VaultStoreSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VaultStoreSnapshot> {
        self.state.subscribe()
    }

    /// Fetch every entry and replace the snapshot.
    ///
    /// A call made while another full fetch is running joins it and returns
    /// its outcome instead of issuing a second request.
    pub async fn load(&self) -> Result<()> {
        match self.fetch.try_lock() {
            Ok(mut slot) => {
                *slot = None;
                let outcome = self.fetch_all().await;
                *slot = Some(outcome.clone());
                outcome
            }
            Err(_) => {
                debug!("Joining in-flight entry load");
                let mut slot = self.fetch.lock().await;
                match slot.clone() {
                    Some(outcome) => outcome,
                    // Previous fetch was cancelled before finishing
                    None => {
                        let outcome = self.fetch_all().await;
                        *slot = Some(outcome.clone());
                        outcome
                    }
                }
            }
        }
    }

    /// Fetch every entry, never reusing a fetch that started earlier.
    ///
    /// Waits for any in-flight fetch to finish first so the result reflects
    /// writes that completed before this call.
    pub async fn refresh(&self) -> Result<()> {
        let mut slot = self.fetch.lock().await;
        *slot = None;
        let outcome = self.fetch_all().await;
        *slot = Some(outcome.clone());
        outcome
    }

    async fn fetch_all(&self) -> Result<()> {
        let result = self.call(|gateway| gateway.get_all_entries()).await;
        match result {
            Ok(entries) => {
                debug!("Loaded {} entries", entries.len());
                self.state.send_modify(|s| {
                    s.entries = entries;
                    s.query.clear();
                });
                Ok(())
            }
            Err(e) => Err(self.fail("Failed to load entries", e)),
        }
    }

    /// Filter entries on the backend. An empty query is a full refresh.
    pub async fn search(&self, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return self.refresh().await;
        }

        let result = self.call(|gateway| gateway.search_entries(query)).await;
        match result {
            Ok(entries) => {
                debug!("Search matched {} entries", entries.len());
                self.state.send_modify(|s| {
                    s.entries = entries;
                    s.query = query.to_string();
                });
                Ok(())
            }
            Err(e) => Err(self.fail("Search failed", e)),
        }
    }

    /// Create an entry, then reload.
    ///
    /// Once the backend accepted the entry its id is returned even if the
    /// reload fails; that failure is left in `last_error`.
    pub async fn create(&self, draft: EntryDraft) -> Result<EntryId> {
        validate_draft(&draft).map_err(|e| self.reject(e))?;

        let id = self
            .call(|gateway| gateway.create_password_entry(&draft))
            .await
            .map_err(|e| self.fail("Failed to create entry", e))?;
        info!("Created entry {}", id);

        self.reload_after_write().await;
        Ok(id)
    }

    /// Apply a partial update, then reload
    pub async fn update(&self, id: &EntryId, patch: EntryPatch) -> Result<()> {
        validate_patch(&patch).map_err(|e| self.reject(e))?;

        self.call(|gateway| gateway.update_password_entry(id, &patch))
            .await
            .map_err(|e| self.fail("Failed to update entry", e))?;
        info!("Updated entry {}", id);

        self.reload_after_write().await;
        Ok(())
    }

    /// Delete an entry, clear it from the selection, then reload
    pub async fn delete(&self, id: &EntryId) -> Result<()> {
        self.call(|gateway| gateway.delete_password_entry(id))
            .await
            .map_err(|e| self.fail("Failed to delete entry", e))?;
        info!("Deleted entry {}", id);

        self.state.send_if_modified(|s| {
            if s.selected.as_ref() == Some(id) {
                s.selected = None;
                true
            } else {
                false
            }
        });

        self.reload_after_write().await;
        Ok(())
    }

    /// Flip the favorite flag of an entry
    pub async fn toggle_favorite(&self, id: &EntryId) -> Result<()> {
        let current = self
            .state
            .borrow()
            .entries
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.is_favorite);

        // Not in a search-narrowed snapshot; ask the backend
        let is_favorite = match current {
            Some(is_favorite) => is_favorite,
            None => self.fetch_entry(id).await?.is_favorite,
        };

        self.update(id, EntryPatch::favorite(!is_favorite)).await
    }

    /// Read one entry straight from the backend; the snapshot is untouched
    pub async fn fetch_entry(&self, id: &EntryId) -> Result<VaultEntry> {
        self.call(|gateway| gateway.get_entry_by_id(id))
            .await
            .map_err(|e| self.fail("Failed to fetch entry", e))
    }

    /// Ask the backend for a random password
    pub async fn generate_password(&self, length: usize, include_symbols: bool) -> Result<String> {
        if !GENERATED_PASSWORD_LEN.contains(&length) {
            return Err(self.reject(PassVaultError::Validation(format!(
                "Password length must be between {} and {}",
                GENERATED_PASSWORD_LEN.start(),
                GENERATED_PASSWORD_LEN.end()
            ))));
        }

        self.call(|gateway| gateway.generate_password(length, include_symbols))
            .await
            .map_err(|e| self.fail("Failed to generate password", e))
    }

    /// Local selection; never reaches the backend
    pub fn select(&self, id: Option<EntryId>) {
        self.state.send_if_modified(|s| {
            if s.selected == id {
                return false;
            }
            s.selected = id;
            true
        });
    }

    pub fn clear_error(&self) {
        self.state.send_if_modified(|s| s.last_error.take().is_some());
    }

    /// Drop every cached entry, for example on logout
    pub fn clear(&self) {
        self.state.send_modify(|s| {
            s.entries.clear();
            s.selected = None;
            s.query.clear();
            s.last_error = None;
        });
        debug!("Entry cache cleared");
    }

    async fn reload_after_write(&self) {
        if let Err(e) = self.refresh().await {
            warn!("Write succeeded but reload failed, keeping stale entries: {}", e);
        }
    }

    /// Run one gateway command with `loading` raised
    async fn call<'a, T, F, Fut>(&'a self, command: F) -> Result<T>
    where
        F: FnOnce(&'a dyn BackendGateway) -> Fut,
        Fut: Future<Output = GatewayResult<T>> + 'a,
    {
        let _busy = Busy::enter(&self.state);
        self.gateway.wait_ready().await?;
        Ok(command(self.gateway.as_ref()).await?)
    }

    fn fail(&self, action: &str, err: PassVaultError) -> PassVaultError {
        warn!("{}: {}", action, err);
        self.state
            .send_modify(|s| s.last_error = Some(err.to_string()));
        err
    }

    fn reject(&self, err: PassVaultError) -> PassVaultError {
        self.state
            .send_modify(|s| s.last_error = Some(err.to_string()));
        err
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PassVaultError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn validate_draft(draft: &EntryDraft) -> Result<()> {
    require(&draft.title, "Title")?;
    require(&draft.username, "Username")?;
    require(&draft.password, "Password")
}

fn validate_patch(patch: &EntryPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(PassVaultError::validation("No changes to save"));
    }
    if let Some(title) = &patch.title {
        require(title, "Title")?;
    }
    if let Some(username) = &patch.username {
        require(username, "Username")?;
    }
    if let Some(password) = &patch.password {
        require(password, "Password")?;
    }
    Ok(())
}
