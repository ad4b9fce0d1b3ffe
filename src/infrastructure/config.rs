//! Configuration file management.
//!
//! Handles loading and saving the TOML configuration file, which also
//! holds the sync preferences and engine enablement written at runtime.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::application::{PreferenceStore, SyncEngineStorage};
use crate::domain::{AppConfig, AppError, Result, SyncEngine};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Browser Sync Store Configuration
# Auto-generated - edit as needed

[sync]
# Sync bookmarks once signed in
bookmarks_sync_enabled = true

# Sync history once signed in
history_sync_enabled = true

[engines]
# Written when engines are toggled; a missing entry means disabled
# bookmarks = true
# history = true

[account]
# Server authentication URLs are built from
auth_server = "https://accounts.firefox.com"

[titles]
# Display titles for the built-in bookmark folders
desktop = "Desktop Bookmarks"
mobile = "Bookmarks"
menu = "Bookmarks Menu"
toolbar = "Bookmarks Toolbar"
unfiled = "Other Bookmarks"

[paths]
# Custom data directory (optional, defaults to ~/.browser-sync-store)
# data_dir = "/custom/path"
"#;

/// Load configuration from file or create default.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = config_file_path();

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Save configuration to a specific file.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config_to_file(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::io("Failed to create config directory", e))?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize config: {e}"),
    })?;

    fs::write(path, content)
        .map_err(|e| AppError::io(format!("Failed to write config file: {}", path.display()), e))?;

    tracing::debug!(path = %path.display(), "Configuration saved");

    Ok(())
}

/// Create default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists() -> Result<()> {
    let config_path = config_file_path();

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(())
}

/// Get the path to the configuration file.
#[must_use]
pub fn config_file_path() -> PathBuf {
    AppConfig::default_data_dir().join("config.toml")
}

/// Preferences and engine status backed by the configuration file.
///
/// Every write is persisted immediately.
pub struct SettingsFile {
    path: PathBuf,
    config: Mutex<AppConfig>,
}

impl SettingsFile {
    #[must_use]
    pub fn new(config: AppConfig, path: PathBuf) -> Self {
        Self {
            path,
            config: Mutex::new(config),
        }
    }

    /// Snapshot of the current configuration.
    #[must_use]
    pub fn config(&self) -> AppConfig {
        self.config.lock().clone()
    }

    fn update(&self, f: impl FnOnce(&mut AppConfig)) -> Result<()> {
        let mut config = self.config.lock();
        f(&mut config);
        save_config_to_file(&config, &self.path)
    }
}

impl PreferenceStore for SettingsFile {
    fn sync_enabled(&self, engine: SyncEngine) -> bool {
        self.config.lock().sync.is_enabled(engine)
    }

    fn set_sync_enabled(&self, engine: SyncEngine, enabled: bool) -> Result<()> {
        self.update(|config| config.sync.set_enabled(engine, enabled))
    }
}

impl SyncEngineStorage for SettingsFile {
    fn set_status(&self, engine: SyncEngine, enabled: bool) -> Result<()> {
        self.update(|config| config.engines.set_status(engine, enabled))
    }

    fn get_status(&self) -> HashMap<SyncEngine, bool> {
        let config = self.config.lock();
        SyncEngine::ALL
            .into_iter()
            .filter_map(|engine| config.engines.status(engine).map(|on| (engine, on)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert!(config.sync.bookmarks_sync_enabled);
        assert_eq!(config.engines.status(SyncEngine::History), None);
        assert_eq!(config.titles.unfiled, "Other Bookmarks");
        assert_eq!(config.account.auth_server, "https://accounts.firefox.com");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.sync.history_sync_enabled = false;
        config.engines.set_status(SyncEngine::Bookmarks, true);

        save_config_to_file(&config, &config_path).unwrap();
        let loaded = load_config_from_file(&config_path).unwrap();

        assert!(!loaded.sync.history_sync_enabled);
        assert_eq!(loaded.engines, config.engines);
    }

    #[test]
    fn test_settings_file_persists_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = SettingsFile::new(AppConfig::default(), path.clone());
        assert!(settings.get_status().is_empty());

        settings.set_sync_enabled(SyncEngine::History, false).unwrap();
        settings.set_status(SyncEngine::Bookmarks, true).unwrap();

        assert!(!settings.sync_enabled(SyncEngine::History));
        assert_eq!(
            settings.get_status(),
            HashMap::from([(SyncEngine::Bookmarks, true)])
        );

        let reloaded = load_config_from_file(&path).unwrap();
        assert!(!reloaded.sync.history_sync_enabled);
        assert_eq!(reloaded.engines.status(SyncEngine::Bookmarks), Some(true));
    }
}
