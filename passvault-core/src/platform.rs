//! Platform-specific locations for client-side files

use std::path::PathBuf;

const APP_DIR: &str = "PasswordVault";

/// Get the platform-specific config directory
///
/// Returns:
/// - Windows: %APPDATA%\PasswordVault
/// - macOS: ~/Library/Application Support/PasswordVault
/// - Linux/Other: ~/.config/PasswordVault
pub fn get_config_dir() -> PathBuf {
    let base = dirs::config_dir()
        .or_else(dirs::data_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_config_dir() {
        let dir = get_config_dir();
        assert!(dir.ends_with(APP_DIR));
    }
}
