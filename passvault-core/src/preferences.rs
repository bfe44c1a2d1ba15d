//! User preferences persisted outside the backend.
//!
//! Stored as one JSON object under [`STORAGE_KEY`]. Loading never fails:
//! missing or corrupt data falls back to the defaults, and a stored object
//! is merged shallowly over them so keys added later get their default.

use crate::platform::get_config_dir;
use crate::session::autolock::DEFAULT_TIMEOUT_MINUTES;
use crate::{PassVaultError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Fixed key the preferences record is stored under
pub const STORAGE_KEY: &str = "passwordvault-settings";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub auto_lock_enabled: bool,
    /// Inactivity timeout in minutes
    #[serde(rename = "autoLockTime")]
    pub auto_lock_minutes: u32,
    pub show_passwords_by_default: bool,
    pub dark_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category: Option<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_lock_enabled: true,
            auto_lock_minutes: DEFAULT_TIMEOUT_MINUTES,
            show_passwords_by_default: false,
            dark_mode: false,
            default_category: None,
        }
    }
}

impl Preferences {
    /// Parse a stored record and lay it over the defaults
    fn from_stored(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        use serde::de::Error as _;

        let stored: Value = serde_json::from_str(raw)?;
        let Value::Object(stored) = stored else {
            return Err(serde_json::Error::custom("preferences must be a JSON object"));
        };

        let mut merged = serde_json::to_value(Self::default())?;
        if let Value::Object(base) = &mut merged {
            base.extend(stored);
        }
        serde_json::from_value(merged)
    }
}

/// Partial preference change; `None` keeps the current value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub auto_lock_enabled: Option<bool>,
    pub auto_lock_minutes: Option<u32>,
    pub show_passwords_by_default: Option<bool>,
    pub dark_mode: Option<bool>,
    /// `Some(None)` clears the default category
    pub default_category: Option<Option<String>>,
}

impl PreferencesPatch {
    fn apply_to(self, preferences: &mut Preferences) {
        if let Some(enabled) = self.auto_lock_enabled {
            preferences.auto_lock_enabled = enabled;
        }
        if let Some(minutes) = self.auto_lock_minutes {
            preferences.auto_lock_minutes = minutes;
        }
        if let Some(show) = self.show_passwords_by_default {
            preferences.show_passwords_by_default = show;
        }
        if let Some(dark_mode) = self.dark_mode {
            preferences.dark_mode = dark_mode;
        }
        if let Some(category) = self.default_category {
            preferences.default_category = category;
        }
    }
}

/// Key-value persistence for client-side records
pub trait PreferenceStorage: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> io::Result<()>;
}

/// Stores each key as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Storage in the platform config directory
    pub fn default_location() -> Self {
        Self::new(get_config_dir())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl PreferenceStorage for FileStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)
    }
}

/// Process-local storage, nothing survives a restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl PreferenceStorage for MemoryStorage {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Observable preferences backed by a [`PreferenceStorage`]
pub struct PreferencesStore {
    storage: Arc<dyn PreferenceStorage>,
    state: watch::Sender<Preferences>,
}

impl PreferencesStore {
    /// Starts from the defaults; call [`load`](Self::load) to read storage
    pub fn new(storage: Arc<dyn PreferenceStorage>) -> Self {
        let (state, _rx) = watch::channel(Preferences::default());
        Self { storage, state }
    }

    pub fn get(&self) -> Preferences {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Preferences> {
        self.state.subscribe()
    }

    /// Read stored preferences, falling back to the defaults
    pub fn load(&self) -> Preferences {
        let loaded = match self.storage.read(STORAGE_KEY) {
            Ok(Some(raw)) => match Preferences::from_stored(&raw) {
                Ok(preferences) => preferences,
                Err(e) => {
                    warn!("Stored preferences are corrupt, using defaults: {}", e);
                    Preferences::default()
                }
            },
            Ok(None) => {
                debug!("No stored preferences, using defaults");
                Preferences::default()
            }
            Err(e) => {
                warn!("Failed to read preferences, using defaults: {}", e);
                Preferences::default()
            }
        };

        let loaded = if loaded.auto_lock_minutes == 0 {
            warn!("Stored auto-lock timeout of 0 minutes ignored");
            Preferences {
                auto_lock_minutes: DEFAULT_TIMEOUT_MINUTES,
                ..loaded
            }
        } else {
            loaded
        };

        self.state.send_replace(loaded.clone());
        loaded
    }

    /// Merge `patch` over the current preferences and persist.
    ///
    /// If persisting fails the new value is still in effect for this
    /// process and the failure is returned.
    pub fn update(&self, patch: PreferencesPatch) -> Result<Preferences> {
        if patch.auto_lock_minutes == Some(0) {
            return Err(PassVaultError::validation(
                "Auto-lock timeout must be at least one minute",
            ));
        }

        let mut updated = self.get();
        patch.apply_to(&mut updated);
        self.state.send_replace(updated.clone());
        self.persist(&updated)?;
        info!("Preferences updated");
        Ok(updated)
    }

    /// Restore and persist the defaults
    pub fn reset(&self) -> Result<Preferences> {
        let defaults = Preferences::default();
        self.state.send_replace(defaults.clone());
        self.persist(&defaults)?;
        info!("Preferences reset to defaults");
        Ok(defaults)
    }

    fn persist(&self, preferences: &Preferences) -> Result<()> {
        let json = serde_json::to_string(preferences)
            .map_err(|e| PassVaultError::Preferences(e.to_string()))?;
        self.storage.write(STORAGE_KEY, &json).map_err(|e| {
            warn!("Failed to save preferences: {}", e);
            PassVaultError::Preferences(e.to_string())
        })
    }
}
