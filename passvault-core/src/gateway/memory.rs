//! In-process backend holding the vault in memory.
//!
//! Behaves like the real backend from the client's point of view: entry
//! commands require a verified session, listings come back ordered by
//! title, and `updated_at` advances on every write. It also supports
//! simulated outages, injected failures, latency and per-command call
//! counts so session and store behavior can be exercised end to end.

use super::{generate_password, BackendGateway, Command, GatewayError, GatewayResult, ReadinessGate};
use crate::clock::{Clock, SystemClock};
use crate::models::{EntryDraft, EntryId, EntryPatch, VaultEntry};
use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

#[derive(Default)]
struct Backend {
    master_password: Option<Zeroizing<String>>,
    authenticated: bool,
    entries: Vec<VaultEntry>,
    reachable: bool,
    injected: HashMap<Command, GatewayError>,
    calls: HashMap<Command, usize>,
}

/// Memory-backed [`BackendGateway`]
pub struct InMemoryGateway {
    backend: Mutex<Backend>,
    clock: Arc<dyn Clock>,
    ready: ReadinessGate,
    latency: Mutex<Option<Duration>>,
}

impl InMemoryGateway {
    /// An empty backend with no master password, ready for commands
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            backend: Mutex::new(Backend {
                reachable: true,
                ..Backend::default()
            }),
            clock,
            ready: ReadinessGate::opened(),
            latency: Mutex::new(None),
        }
    }

    /// A backend whose commands wait for `gate` to open
    pub fn with_readiness(mut self, gate: ReadinessGate) -> Self {
        self.ready = gate;
        self
    }

    /// Seed an existing master password, as if set up in an earlier process
    pub fn with_master_password(self, password: &str) -> Self {
        if let Ok(mut backend) = self.backend.lock() {
            backend.master_password = Some(Zeroizing::new(password.to_string()));
        }
        self
    }

    /// Simulate the backend going away or coming back
    pub fn set_reachable(&self, reachable: bool) {
        if let Ok(mut backend) = self.backend.lock() {
            backend.reachable = reachable;
        }
    }

    /// Make the next call of `command` fail with `error`
    pub fn fail_next(&self, command: Command, error: GatewayError) {
        if let Ok(mut backend) = self.backend.lock() {
            backend.injected.insert(command, error);
        }
    }

    /// Delay every command by `latency` (tokio time)
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut current) = self.latency.lock() {
            *current = latency;
        }
    }

    /// How many times `command` has been issued
    pub fn call_count(&self, command: Command) -> usize {
        self.backend
            .lock()
            .map(|backend| backend.calls.get(&command).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Whether a verified session is open on the backend side
    pub fn is_authenticated(&self) -> bool {
        self.backend
            .lock()
            .map(|backend| backend.authenticated)
            .unwrap_or(false)
    }

    /// Add an entry directly, bypassing authentication. Returns its id.
    pub fn insert_entry(&self, draft: EntryDraft) -> GatewayResult<EntryId> {
        let mut backend = self.backend()?;
        Ok(Self::push_entry(&mut backend, draft, self.clock.as_ref()))
    }

    fn backend(&self) -> GatewayResult<MutexGuard<'_, Backend>> {
        self.backend
            .lock()
            .map_err(|_| GatewayError::Storage("Backend lock poisoned".to_string()))
    }

    /// Record the call, wait out the latency, then apply outage or
    /// injected failure
    async fn enter(&self, command: Command) -> GatewayResult<()> {
        {
            let mut backend = self.backend()?;
            *backend.calls.entry(command).or_insert(0) += 1;
            debug!("backend command: {}", command);
        }

        let latency = self.latency.lock().ok().and_then(|latency| *latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut backend = self.backend()?;
        if !backend.reachable {
            return Err(GatewayError::Unavailable(format!(
                "{} failed: backend unreachable",
                command
            )));
        }
        if let Some(error) = backend.injected.remove(&command) {
            return Err(error);
        }
        Ok(())
    }

    fn authenticated(&self) -> GatewayResult<MutexGuard<'_, Backend>> {
        let backend = self.backend()?;
        if !backend.authenticated {
            return Err(GatewayError::NotAuthenticated);
        }
        Ok(backend)
    }

    fn push_entry(backend: &mut Backend, draft: EntryDraft, clock: &dyn Clock) -> EntryId {
        let now = clock.now();
        let id = EntryId::new(Uuid::new_v4().to_string());
        backend.entries.push(VaultEntry {
            id: id.clone(),
            title: draft.title,
            username: draft.username,
            password: draft.password,
            url: draft.url,
            notes: draft.notes,
            category: draft.category,
            is_favorite: draft.is_favorite,
            created_at: now,
            updated_at: now,
        });
        id
    }

    fn sorted_by_title(mut entries: Vec<VaultEntry>) -> Vec<VaultEntry> {
        entries.sort_by(|a, b| a.title.cmp(&b.title));
        entries
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendGateway for InMemoryGateway {
    async fn wait_ready(&self) -> GatewayResult<()> {
        self.ready.wait().await;
        Ok(())
    }

    async fn has_master_password(&self) -> GatewayResult<bool> {
        self.enter(Command::HasMasterPassword).await?;
        Ok(self.backend()?.master_password.is_some())
    }

    async fn setup_master_password(&self, password: &str) -> GatewayResult<bool> {
        self.enter(Command::SetupMasterPassword).await?;
        let mut backend = self.backend()?;
        if backend.master_password.is_some() {
            return Err(GatewayError::AlreadyInitialized);
        }
        backend.master_password = Some(Zeroizing::new(password.to_string()));
        backend.authenticated = true;
        Ok(true)
    }

    async fn verify_master_password(&self, password: &str) -> GatewayResult<bool> {
        self.enter(Command::VerifyMasterPassword).await?;
        let mut backend = self.backend()?;
        let matches = backend
            .master_password
            .as_ref()
            .is_some_and(|stored| stored.as_str() == password);
        if matches {
            backend.authenticated = true;
        }
        Ok(matches)
    }

    async fn logout(&self) -> GatewayResult<()> {
        self.enter(Command::Logout).await?;
        self.backend()?.authenticated = false;
        Ok(())
    }

    async fn create_password_entry(&self, draft: &EntryDraft) -> GatewayResult<EntryId> {
        self.enter(Command::CreatePasswordEntry).await?;
        let mut backend = self.authenticated()?;
        if draft.title.trim().is_empty() {
            return Err(GatewayError::Validation("Title is required".to_string()));
        }
        Ok(Self::push_entry(&mut backend, draft.clone(), self.clock.as_ref()))
    }

    async fn get_all_entries(&self) -> GatewayResult<Vec<VaultEntry>> {
        self.enter(Command::GetAllEntries).await?;
        let backend = self.authenticated()?;
        Ok(Self::sorted_by_title(backend.entries.clone()))
    }

    async fn get_entry_by_id(&self, id: &EntryId) -> GatewayResult<VaultEntry> {
        self.enter(Command::GetEntryById).await?;
        let backend = self.authenticated()?;
        backend
            .entries
            .iter()
            .find(|entry| &entry.id == id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn update_password_entry(&self, id: &EntryId, patch: &EntryPatch) -> GatewayResult<()> {
        self.enter(Command::UpdatePasswordEntry).await?;
        let now = self.clock.now();
        let mut backend = self.authenticated()?;
        let entry = backend
            .entries
            .iter_mut()
            .find(|entry| &entry.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;

        if patch.is_empty() {
            return Ok(());
        }
        patch.apply_to(entry);
        // Strictly increasing even if the clock has not moved
        entry.updated_at = now.max(entry.updated_at + ChronoDuration::microseconds(1));
        Ok(())
    }

    async fn delete_password_entry(&self, id: &EntryId) -> GatewayResult<()> {
        self.enter(Command::DeletePasswordEntry).await?;
        let mut backend = self.authenticated()?;
        let before = backend.entries.len();
        backend.entries.retain(|entry| &entry.id != id);
        if backend.entries.len() == before {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn search_entries(&self, query: &str) -> GatewayResult<Vec<VaultEntry>> {
        self.enter(Command::SearchEntries).await?;
        let backend = self.authenticated()?;
        let needle = query.to_lowercase();
        let matches = backend
            .entries
            .iter()
            .filter(|entry| {
                entry.title.to_lowercase().contains(&needle)
                    || entry
                        .category
                        .as_deref()
                        .is_some_and(|category| category.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        Ok(Self::sorted_by_title(matches))
    }

    async fn generate_password(
        &self,
        length: usize,
        include_symbols: bool,
    ) -> GatewayResult<String> {
        self.enter(Command::GeneratePassword).await?;
        generate_password(length, include_symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn draft(title: &str, category: Option<&str>) -> EntryDraft {
        EntryDraft {
            title: title.to_string(),
            username: "user@example.com".to_string(),
            password: "hunter22".to_string(),
            category: category.map(str::to_string),
            ..EntryDraft::default()
        }
    }

    #[tokio::test]
    async fn test_setup_then_verify() {
        let gateway = InMemoryGateway::new();
        assert!(!gateway.has_master_password().await.unwrap());

        assert!(gateway.setup_master_password("longenough1").await.unwrap());
        assert_eq!(
            gateway.setup_master_password("another-one").await,
            Err(GatewayError::AlreadyInitialized)
        );

        gateway.logout().await.unwrap();
        assert!(!gateway.verify_master_password("wrong").await.unwrap());
        assert!(gateway.verify_master_password("longenough1").await.unwrap());
        assert!(gateway.is_authenticated());
    }

    #[tokio::test]
    async fn test_entry_commands_require_session() {
        let gateway = InMemoryGateway::new().with_master_password("longenough1");
        assert_eq!(
            gateway.get_all_entries().await,
            Err(GatewayError::NotAuthenticated)
        );
    }

    #[tokio::test]
    async fn test_listing_sorted_and_search_matches_title_or_category() {
        let gateway = InMemoryGateway::new();
        gateway.setup_master_password("longenough1").await.unwrap();
        gateway
            .create_password_entry(&draft("Zeta Bank", Some("Banking")))
            .await
            .unwrap();
        gateway
            .create_password_entry(&draft("Alpha Mail", Some("Email")))
            .await
            .unwrap();

        let all = gateway.get_all_entries().await.unwrap();
        let titles: Vec<_> = all.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha Mail", "Zeta Bank"]);

        let hits = gateway.search_entries("bank").await.unwrap();
        assert_eq!(hits.len(), 1);
        let hits = gateway.search_entries("EMAIL").await.unwrap();
        assert_eq!(hits[0].title, "Alpha Mail");
    }

    #[tokio::test]
    async fn test_update_advances_timestamp() {
        let clock = ManualClock::default();
        let gateway = InMemoryGateway::with_clock(Arc::new(clock.clone()));
        gateway.setup_master_password("longenough1").await.unwrap();
        let id = gateway
            .create_password_entry(&draft("Mail", None))
            .await
            .unwrap();
        let before = gateway.get_entry_by_id(&id).await.unwrap().updated_at;

        // Clock has not moved; timestamp must still advance
        gateway
            .update_password_entry(&id, &EntryPatch::favorite(true))
            .await
            .unwrap();
        let after = gateway.get_entry_by_id(&id).await.unwrap();
        assert!(after.updated_at > before);
        assert!(after.is_favorite);
    }

    #[tokio::test]
    async fn test_delete_missing_entry() {
        let gateway = InMemoryGateway::new();
        gateway.setup_master_password("longenough1").await.unwrap();
        let result = gateway.delete_password_entry(&EntryId::from("nope")).await;
        assert!(matches!(result, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_outage_and_injected_failure() {
        let gateway = InMemoryGateway::new();
        gateway.set_reachable(false);
        assert!(matches!(
            gateway.has_master_password().await,
            Err(GatewayError::Unavailable(_))
        ));

        gateway.set_reachable(true);
        gateway.fail_next(
            Command::HasMasterPassword,
            GatewayError::Storage("disk full".to_string()),
        );
        assert!(gateway.has_master_password().await.is_err());
        assert!(gateway.has_master_password().await.is_ok());
        assert_eq!(gateway.call_count(Command::HasMasterPassword), 3);
    }
}
