//! Sync-related domain models and configuration.
//!
//! Contains the persisted configuration, the sync lifecycle state and
//! the vocabulary shared with the account manager (engines, reasons).

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{
    DESKTOP_ROOT_GUID, MENU_ROOT_GUID, MOBILE_ROOT_GUID, TOOLBAR_ROOT_GUID, UNFILED_ROOT_GUID,
};

/// A data category whose synchronization can be toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEngine {
    Bookmarks,
    History,
}

impl SyncEngine {
    pub const ALL: [Self; 2] = [Self::Bookmarks, Self::History];
}

impl std::fmt::Display for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bookmarks => write!(f, "bookmarks"),
            Self::History => write!(f, "history"),
        }
    }
}

impl std::str::FromStr for SyncEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bookmarks" => Ok(Self::Bookmarks),
            "history" => Ok(Self::History),
            _ => Err(format!("Unknown sync engine: {s}. Use: bookmarks, history")),
        }
    }
}

/// Why a sync was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncReason {
    #[default]
    Startup,
    User,
    Scheduled,
    EngineChange,
    FirstSync,
}

/// Failure reported by the sync engine's lifecycle observer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SyncFailure {
    pub message: String,
}

impl SyncFailure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Persisted per-engine preference flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Whether bookmarks sync is wanted once signed in.
    #[serde(default = "default_enabled")]
    pub bookmarks_sync_enabled: bool,

    /// Whether history sync is wanted once signed in.
    #[serde(default = "default_enabled")]
    pub history_sync_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bookmarks_sync_enabled: default_enabled(),
            history_sync_enabled: default_enabled(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn is_enabled(&self, engine: SyncEngine) -> bool {
        match engine {
            SyncEngine::Bookmarks => self.bookmarks_sync_enabled,
            SyncEngine::History => self.history_sync_enabled,
        }
    }

    pub fn set_enabled(&mut self, engine: SyncEngine, enabled: bool) {
        match engine {
            SyncEngine::Bookmarks => self.bookmarks_sync_enabled = enabled,
            SyncEngine::History => self.history_sync_enabled = enabled,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

/// Engine enablement map. An absent entry means the engine is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmarks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<bool>,
}

impl EngineConfig {
    #[must_use]
    pub const fn status(&self, engine: SyncEngine) -> Option<bool> {
        match engine {
            SyncEngine::Bookmarks => self.bookmarks,
            SyncEngine::History => self.history,
        }
    }

    pub fn set_status(&mut self, engine: SyncEngine, enabled: bool) {
        match engine {
            SyncEngine::Bookmarks => self.bookmarks = Some(enabled),
            SyncEngine::History => self.history = Some(enabled),
        }
    }
}

/// Account manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Base URL authentication URLs are built from.
    #[serde(default = "default_auth_server")]
    pub auth_server: String,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            auth_server: default_auth_server(),
        }
    }
}

fn default_auth_server() -> String {
    "https://accounts.firefox.com".to_string()
}

/// Localized display titles for the built-in bookmark roots.
///
/// Loaded once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootTitles {
    #[serde(default = "default_desktop_title")]
    pub desktop: String,
    #[serde(default = "default_mobile_title")]
    pub mobile: String,
    #[serde(default = "default_menu_title")]
    pub menu: String,
    #[serde(default = "default_toolbar_title")]
    pub toolbar: String,
    #[serde(default = "default_unfiled_title")]
    pub unfiled: String,
}

impl Default for RootTitles {
    fn default() -> Self {
        Self {
            desktop: default_desktop_title(),
            mobile: default_mobile_title(),
            menu: default_menu_title(),
            toolbar: default_toolbar_title(),
            unfiled: default_unfiled_title(),
        }
    }
}

impl RootTitles {
    /// User-facing title for a root GUID, `None` for anything else.
    #[must_use]
    pub fn title_for(&self, guid: &str) -> Option<&str> {
        match guid {
            DESKTOP_ROOT_GUID => Some(&self.desktop),
            MOBILE_ROOT_GUID => Some(&self.mobile),
            MENU_ROOT_GUID => Some(&self.menu),
            TOOLBAR_ROOT_GUID => Some(&self.toolbar),
            UNFILED_ROOT_GUID => Some(&self.unfiled),
            _ => None,
        }
    }
}

fn default_desktop_title() -> String {
    "Desktop Bookmarks".to_string()
}

fn default_mobile_title() -> String {
    "Bookmarks".to_string()
}

fn default_menu_title() -> String {
    "Bookmarks Menu".to_string()
}

fn default_toolbar_title() -> String {
    "Bookmarks Toolbar".to_string()
}

fn default_unfiled_title() -> String {
    "Other Bookmarks".to_string()
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Per-engine sync preferences.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Engine enablement as last applied to the sync engine.
    #[serde(default)]
    pub engines: EngineConfig,

    /// Account manager settings.
    #[serde(default)]
    pub account: AccountConfig,

    /// Bookmark root titles.
    #[serde(default)]
    pub titles: RootTitles,

    /// Path configuration.
    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".browser-sync-store")
    }

    /// Get the places database path.
    #[must_use]
    pub fn places_db_path(&self) -> PathBuf {
        self.data_dir().join("places.db")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// Get the signed-in account file path.
    #[must_use]
    pub fn account_file_path(&self) -> PathBuf {
        self.data_dir().join("account.json")
    }
}

/// Phase of the sync engine as seen through its lifecycle signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Syncing,
    Error,
}

/// Current state of synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Whether a sync is currently in progress.
    pub is_syncing: bool,

    /// Completion time of the last successful sync, in epoch millis. Zero if never.
    pub last_sync_millis: i64,

    /// Last error message if the most recent sync failed.
    pub last_error: Option<String>,
}

impl SyncState {
    /// Mark sync as in progress.
    #[must_use]
    pub fn syncing(mut self) -> Self {
        self.is_syncing = true;
        self.last_error = None;
        self
    }

    /// Mark sync as completed now.
    #[must_use]
    pub fn completed(mut self) -> Self {
        self.is_syncing = false;
        self.last_sync_millis = Utc::now().timestamp_millis();
        self
    }

    /// Set error state. The last sync time is left alone.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.last_error = Some(error.into());
        self.is_syncing = false;
        self
    }

    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        if self.is_syncing {
            SyncPhase::Syncing
        } else if self.last_error.is_some() {
            SyncPhase::Error
        } else {
            SyncPhase::Idle
        }
    }
}
