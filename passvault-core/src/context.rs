//! Explicit context wiring one client session together.
//!
//! A context owns the auth session, its idle timer, the entry store, the
//! category list and the preferences. Nothing is global, so several
//! contexts can run side by side against different backends.
//!
//! Error routing: operation and environment errors are sent to the
//! [`Notifier`]; validation and authentication errors are only returned so
//! they can be shown next to the input that caused them.

use crate::categories::CategoryStore;
use crate::clock::{Clock, SystemClock};
use crate::gateway::BackendGateway;
use crate::lockout::LockoutConfig;
use crate::models::{EntryDraft, EntryId, EntryPatch};
use crate::notify::{ConfirmRequest, Confirmer, Notification, Notifier, StaticConfirmer, TracingNotifier};
use crate::preferences::{FileStorage, PreferenceStorage, Preferences, PreferencesPatch, PreferencesStore};
use crate::session::autolock::DEFAULT_TIMEOUT_MINUTES;
use crate::session::idle::IdleLockTimer;
use crate::session::{AuthPhase, AuthSessionMachine};
use crate::store::VaultStore;
use crate::{ErrorKind, PassVaultError, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Collects the collaborators of a [`VaultContext`]
pub struct VaultContextBuilder {
    gateway: Arc<dyn BackendGateway>,
    clock: Arc<dyn Clock>,
    storage: Arc<dyn PreferenceStorage>,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    lockout: LockoutConfig,
}

impl VaultContextBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn PreferenceStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = confirmer;
        self
    }

    pub fn lockout(mut self, lockout: LockoutConfig) -> Self {
        self.lockout = lockout;
        self
    }

    pub fn build(self) -> VaultContext {
        let session = Arc::new(AuthSessionMachine::with_config(
            self.gateway.clone(),
            self.clock.clone(),
            self.lockout,
        ));
        let idle = Arc::new(IdleLockTimer::new(session.clone(), DEFAULT_TIMEOUT_MINUTES));

        VaultContext {
            session,
            idle,
            store: Arc::new(VaultStore::new(self.gateway)),
            categories: CategoryStore::with_clock(self.clock),
            preferences: PreferencesStore::new(self.storage),
            notifier: self.notifier,
            confirmer: self.confirmer,
            idle_task: Mutex::new(None),
        }
    }
}

pub struct VaultContext {
    session: Arc<AuthSessionMachine>,
    idle: Arc<IdleLockTimer>,
    store: Arc<VaultStore>,
    categories: CategoryStore,
    preferences: PreferencesStore,
    notifier: Arc<dyn Notifier>,
    confirmer: Arc<dyn Confirmer>,
    idle_task: Mutex<Option<JoinHandle<()>>>,
}

impl VaultContext {
    /// Start building a context. Defaults: system clock, preferences in the
    /// platform config directory, notifications to the log, and every
    /// confirmation declined.
    pub fn builder(gateway: Arc<dyn BackendGateway>) -> VaultContextBuilder {
        VaultContextBuilder {
            gateway,
            clock: Arc::new(SystemClock),
            storage: Arc::new(FileStorage::default_location()),
            notifier: Arc::new(TracingNotifier),
            confirmer: Arc::new(StaticConfirmer(false)),
            lockout: LockoutConfig::default(),
        }
    }

    pub fn session(&self) -> &Arc<AuthSessionMachine> {
        &self.session
    }

    pub fn store(&self) -> &Arc<VaultStore> {
        &self.store
    }

    pub fn categories(&self) -> &CategoryStore {
        &self.categories
    }

    pub fn preferences(&self) -> &PreferencesStore {
        &self.preferences
    }

    pub fn idle_timer(&self) -> &Arc<IdleLockTimer> {
        &self.idle
    }

    /// Load preferences, configure auto-lock and resolve the auth phase
    pub async fn start(&self) -> Result<AuthPhase> {
        let preferences = self.preferences.load();
        self.apply_auto_lock(&preferences);

        let phase = self.session.initialize().await.map_err(|e| self.report(e))?;
        info!("Vault client started: {:?}", phase);
        Ok(phase)
    }

    /// Create the master password, then load the (empty) vault
    pub async fn setup(&self, password: &str) -> Result<()> {
        self.session.setup(password).await.map_err(|e| self.report(e))?;
        self.idle.record_activity();
        self.notifier
            .notify(Notification::success("Master password created"));
        self.load_entries().await;
        Ok(())
    }

    /// Verify the master password, then load entries
    pub async fn unlock(&self, password: &str) -> Result<()> {
        self.session.verify(password).await.map_err(|e| self.report(e))?;
        self.idle.record_activity();
        self.load_entries().await;
        Ok(())
    }

    /// Lock immediately without asking; cached entries are dropped
    pub async fn lock_now(&self) -> bool {
        let locked = self.session.force_lock().await;
        self.store.clear();
        locked
    }

    /// Ask, then log out. Returns whether the user went through with it.
    pub async fn request_logout(&self) -> bool {
        let request = ConfirmRequest::new("Log out", "Lock the vault and log out?")
            .dangerous("Log out");
        if !self.confirmer.confirm(request).await {
            return false;
        }

        let result = self.session.logout().await;
        self.store.clear();
        match result {
            Ok(()) => self.notifier.notify(Notification::info("Logged out")),
            Err(e) => self.notifier.notify(Notification::warning(format!(
                "Vault locked, but the backend logout failed: {}",
                e
            ))),
        }
        true
    }

    /// Ask, then delete an entry
    pub async fn request_delete_entry(&self, id: &EntryId) -> Result<bool> {
        let title = self
            .store
            .snapshot()
            .entries
            .iter()
            .find(|entry| &entry.id == id)
            .map(|entry| entry.title.clone())
            .unwrap_or_else(|| "this entry".to_string());

        let request = ConfirmRequest::new(
            "Delete entry",
            format!("Delete \"{}\"? This cannot be undone.", title),
        )
        .dangerous("Delete");
        if !self.confirmer.confirm(request).await {
            return Ok(false);
        }

        self.store.delete(id).await.map_err(|e| self.report(e))?;
        self.idle.record_activity();
        self.notifier.notify(Notification::success("Entry deleted"));
        Ok(true)
    }

    /// Ask, then delete a category. Entries keep their category name.
    pub async fn request_delete_category(&self, id: &str) -> Result<bool> {
        let category = self
            .categories
            .get_by_id(id)
            .ok_or_else(|| PassVaultError::NotFound(format!("category {}", id)))
            .map_err(|e| self.report(e))?;

        let request = ConfirmRequest::new(
            "Delete category",
            format!(
                "Delete \"{}\"? Entries in it become uncategorized.",
                category.name
            ),
        )
        .dangerous("Delete");
        if !self.confirmer.confirm(request).await {
            return Ok(false);
        }

        self.categories.delete(id).map_err(|e| self.report(e))?;

        let is_default = self
            .preferences
            .get()
            .default_category
            .is_some_and(|name| name.eq_ignore_ascii_case(&category.name));
        if is_default {
            let patch = PreferencesPatch {
                default_category: Some(None),
                ..PreferencesPatch::default()
            };
            if let Err(e) = self.preferences.update(patch) {
                warn!("Failed to clear default category: {}", e);
            }
        }

        self.notifier
            .notify(Notification::success(format!("Category \"{}\" deleted", category.name)));
        Ok(true)
    }

    /// Ask, then restore default preferences
    pub async fn request_reset_preferences(&self) -> Result<bool> {
        let request = ConfirmRequest::new("Reset settings", "Restore all settings to their defaults?");
        if !self.confirmer.confirm(request).await {
            return Ok(false);
        }

        let result = self.preferences.reset();
        self.apply_auto_lock(&self.preferences.get());
        result.map_err(|e| self.report(e))?;
        self.notifier.notify(Notification::success("Settings reset"));
        Ok(true)
    }

    /// Create an entry. Without a category the preferred default is used.
    pub async fn save_entry(&self, mut draft: EntryDraft) -> Result<EntryId> {
        if draft.category.is_none() {
            draft.category = self.preferences.get().default_category;
        }

        let id = self.store.create(draft).await.map_err(|e| self.report(e))?;
        self.idle.record_activity();
        self.notifier.notify(Notification::success("Entry saved"));
        Ok(id)
    }

    pub async fn update_entry(&self, id: &EntryId, patch: EntryPatch) -> Result<()> {
        self.store
            .update(id, patch)
            .await
            .map_err(|e| self.report(e))?;
        self.idle.record_activity();
        self.notifier.notify(Notification::success("Entry updated"));
        Ok(())
    }

    pub async fn toggle_favorite(&self, id: &EntryId) -> Result<()> {
        self.store
            .toggle_favorite(id)
            .await
            .map_err(|e| self.report(e))?;
        self.idle.record_activity();
        Ok(())
    }

    /// Change preferences; auto-lock settings apply to the timer at once
    pub fn update_preferences(&self, patch: PreferencesPatch) -> Result<Preferences> {
        let result = self.preferences.update(patch);
        // In effect even if it could not be saved
        self.apply_auto_lock(&self.preferences.get());
        result.map_err(|e| self.report(e))
    }

    /// Reset the inactivity clock
    pub fn record_activity(&self) {
        self.idle.record_activity();
    }

    /// Start the auto-lock loop for this context. A loop that is already
    /// running is replaced.
    pub fn spawn_idle_timer(&self, period: Duration) {
        let handle = self.idle.spawn(period);
        if let Some(previous) = self.idle_task().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop_idle_timer(&self) {
        if let Some(handle) = self.idle_task().take() {
            handle.abort();
        }
    }

    pub fn idle_timer_running(&self) -> bool {
        self.idle_task()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn idle_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.idle_task.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn load_entries(&self) {
        if let Err(e) = self.store.load().await {
            self.report(e);
        }
    }

    fn apply_auto_lock(&self, preferences: &Preferences) {
        self.idle.set_enabled(preferences.auto_lock_enabled);
        if let Err(e) = self.idle.set_timeout_minutes(preferences.auto_lock_minutes) {
            warn!("Keeping previous auto-lock timeout: {}", e);
        }
    }

    /// Send errors that are not tied to an input field to the notifier
    fn report(&self, err: PassVaultError) -> PassVaultError {
        match err.kind() {
            ErrorKind::Environment => self
                .notifier
                .notify(Notification::error(err.to_string()).persistent()),
            ErrorKind::Operation => self.notifier.notify(Notification::error(err.to_string())),
            ErrorKind::Validation | ErrorKind::Authentication => {}
        }
        err
    }
}

impl Drop for VaultContext {
    fn drop(&mut self) {
        self.stop_idle_timer();
    }
}
