//! Pure filters over a [`VaultStoreSnapshot`].
//!
//! Nothing here is fetched or cached; every view reflects whatever the last
//! load or search produced.

use super::VaultStoreSnapshot;
use crate::models::VaultEntry;

/// Counts shown next to the navigation items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationCounts {
    pub all: usize,
    pub favorites: usize,
    pub uncategorized: usize,
    /// Per category name, in first-seen order
    pub categories: Vec<(String, usize)>,
}

impl VaultStoreSnapshot {
    pub fn favorites(&self) -> Vec<&VaultEntry> {
        self.entries.iter().filter(|e| e.is_favorite).collect()
    }

    /// Entries whose category matches `name`, ignoring case
    pub fn by_category(&self, name: &str) -> Vec<&VaultEntry> {
        self.entries.iter().filter(|e| e.in_category(name)).collect()
    }

    pub fn uncategorized(&self) -> Vec<&VaultEntry> {
        self.entries.iter().filter(|e| e.is_uncategorized()).collect()
    }

    /// Distinct category names in use, first spelling wins
    pub fn used_categories(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            let Some(name) = entry.category.as_deref() else {
                continue;
            };
            if name.trim().is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                continue;
            }
            names.push(name);
        }
        names
    }

    pub fn selected_entry(&self) -> Option<&VaultEntry> {
        let selected = self.selected.as_ref()?;
        self.entries.iter().find(|e| &e.id == selected)
    }

    pub fn navigation_counts(&self) -> NavigationCounts {
        NavigationCounts {
            all: self.entries.len(),
            favorites: self.entries.iter().filter(|e| e.is_favorite).count(),
            uncategorized: self.entries.iter().filter(|e| e.is_uncategorized()).count(),
            categories: self
                .used_categories()
                .into_iter()
                .map(|name| (name.to_string(), self.by_category(name).len()))
                .collect(),
        }
    }
}
