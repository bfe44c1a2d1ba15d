//! Local category list.
//!
//! Entries refer to categories by name only. Removing or renaming a
//! category never touches entries; they fall back to uncategorized.

use crate::clock::{Clock, SystemClock};
use crate::models::{Category, CategoryDraft};
use crate::{PassVaultError, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_COLOR: &str = "#64748b";
pub const DEFAULT_ICON: &str = "📁";

/// Name, color and icon of the built-in categories
const DEFAULTS: [(&str, &str, &str); 8] = [
    ("Social Media", "#3b82f6", "👥"),
    ("Banking", "#10b981", "🏦"),
    ("Email", "#f59e0b", "📧"),
    ("Work", "#8b5cf6", "💼"),
    ("Shopping", "#ef4444", "🛒"),
    ("Entertainment", "#ec4899", "🎬"),
    ("Utilities", "#6b7280", "⚡"),
    ("Other", DEFAULT_COLOR, DEFAULT_ICON),
];

pub struct CategoryStore {
    clock: Arc<dyn Clock>,
    state: watch::Sender<Vec<Category>>,
}

impl CategoryStore {
    /// Store seeded with the built-in categories
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let defaults = DEFAULTS
            .iter()
            .enumerate()
            .map(|(index, (name, color, icon))| Category {
                id: format!("cat-{}", index + 1),
                name: name.to_string(),
                color: Some(color.to_string()),
                icon: Some(icon.to_string()),
                created_at: now,
            })
            .collect();
        let (state, _rx) = watch::channel(defaults);
        Self { clock, state }
    }

    pub fn list(&self) -> Vec<Category> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Category>> {
        self.state.subscribe()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Category> {
        self.state.borrow().iter().find(|c| c.id == id).cloned()
    }

    /// Case-insensitive lookup
    pub fn get_by_name(&self, name: &str) -> Option<Category> {
        let name = name.trim();
        self.state
            .borrow()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Category an entry should be shown under; `None` means uncategorized,
    /// including names whose category no longer exists
    pub fn resolve(&self, entry_category: Option<&str>) -> Option<Category> {
        entry_category
            .filter(|name| !name.trim().is_empty())
            .and_then(|name| self.get_by_name(name))
    }

    pub fn create(&self, draft: CategoryDraft) -> Result<Category> {
        let name = self.validate_name(&draft.name, None)?;
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name,
            color: Some(draft.color.unwrap_or_else(|| DEFAULT_COLOR.to_string())),
            icon: Some(draft.icon.unwrap_or_else(|| DEFAULT_ICON.to_string())),
            created_at: self.clock.now(),
        };

        self.state.send_modify(|categories| categories.push(category.clone()));
        info!("Created category {}", category.name);
        Ok(category)
    }

    /// Rename or restyle a category; absent color or icon keeps the current one
    pub fn update(&self, id: &str, draft: CategoryDraft) -> Result<Category> {
        if self.get_by_id(id).is_none() {
            return Err(PassVaultError::NotFound(format!("category {}", id)));
        }
        let name = self.validate_name(&draft.name, Some(id))?;

        let mut updated = None;
        self.state.send_modify(|categories| {
            if let Some(category) = categories.iter_mut().find(|c| c.id == id) {
                category.name = name;
                if draft.color.is_some() {
                    category.color = draft.color;
                }
                if draft.icon.is_some() {
                    category.icon = draft.icon;
                }
                updated = Some(category.clone());
            }
        });

        updated.ok_or_else(|| PassVaultError::NotFound(format!("category {}", id)))
    }

    /// Remove a category. Entries that referenced it are left as they are.
    pub fn delete(&self, id: &str) -> Result<Category> {
        let mut removed = None;
        self.state.send_if_modified(|categories| {
            let index = categories.iter().position(|c| c.id == id);
            removed = index.map(|index| categories.remove(index));
            removed.is_some()
        });

        let removed = removed.ok_or_else(|| PassVaultError::NotFound(format!("category {}", id)))?;
        info!("Deleted category {}", removed.name);
        Ok(removed)
    }

    fn validate_name(&self, name: &str, except_id: Option<&str>) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PassVaultError::validation("Category name is required"));
        }

        let taken = self
            .state
            .borrow()
            .iter()
            .any(|c| Some(c.id.as_str()) != except_id && c.name.eq_ignore_ascii_case(name));
        if taken {
            return Err(PassVaultError::Validation(format!(
                "Category \"{}\" already exists",
                name
            )));
        }
        Ok(name.to_string())
    }
}

impl Default for CategoryStore {
    fn default() -> Self {
        Self::new()
    }
}
