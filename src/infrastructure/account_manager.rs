//! File-backed account manager.
//!
//! Stands in for a real accounts server: the signed-in account and any
//! sign-in in progress are kept in a JSON file so separate invocations
//! of the binary can start and finish a sign-in. Sync runs complete
//! immediately.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::application::{AccountManager, AccountObserver, LifecycleScope, SyncStatusObserver};
use crate::domain::{Account, AppError, AuthType, Profile, Result, SyncFailure, SyncReason};

/// Persisted account state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredAccount {
    #[serde(default)]
    account: Option<Account>,
    /// OAuth `state` of a sign-in that was started but not finished.
    #[serde(default)]
    pending_state: Option<String>,
}

/// Account manager persisting to `account.json`.
pub struct LocalAccountManager {
    path: PathBuf,
    auth_server: String,
    state: Mutex<StoredAccount>,
    account_observers: Mutex<Vec<Arc<dyn AccountObserver>>>,
    sync_observers: Mutex<Vec<Arc<dyn SyncStatusObserver>>>,
}

impl LocalAccountManager {
    /// Load the account file, or start signed out if there is none.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path, auth_server: impl Into<String>) -> Result<Self> {
        let state = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                AppError::io(format!("Failed to read account file: {}", path.display()), e)
            })?;
            serde_json::from_str(&content).map_err(AppError::json_parse)?
        } else {
            StoredAccount::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            auth_server: auth_server.into(),
            state: Mutex::new(state),
            account_observers: Mutex::new(Vec::new()),
            sync_observers: Mutex::new(Vec::new()),
        })
    }

    /// Whether a sign-in was started and not yet finished.
    #[must_use]
    pub fn has_pending_sign_in(&self) -> bool {
        self.state.lock().pending_state.is_some()
    }

    /// Complete the pending sign-in as `email` and notify account observers.
    ///
    /// # Errors
    /// Returns error if no sign-in is in progress or the file cannot be written.
    pub fn finish_authentication(&self, email: &str) -> Result<Account> {
        let (account, auth_type) = {
            let mut state = self.state.lock();
            if state.pending_state.is_none() {
                return Err(AppError::account("No sign-in in progress"));
            }

            let (uid, auth_type) = match &state.account {
                Some(existing) if existing.email == email => {
                    (existing.uid.clone(), AuthType::Recovered)
                }
                _ => (uuid::Uuid::new_v4().simple().to_string(), AuthType::Signin),
            };
            let account = Account {
                uid,
                email: email.to_string(),
                needs_reauth: false,
            };
            state.account = Some(account.clone());
            state.pending_state = None;
            self.save(&state)?;
            (account, auth_type)
        };

        tracing::info!(email = %account.email, ?auth_type, "Signed in");
        for observer in self.account_observers() {
            observer.on_authenticated(&account, auth_type);
        }
        Ok(account)
    }

    fn save(&self, state: &StoredAccount) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create account directory", e))?;
        }
        let content = serde_json::to_string_pretty(state).map_err(AppError::json_parse)?;
        fs::write(&self.path, content).map_err(|e| {
            AppError::io(format!("Failed to write account file: {}", self.path.display()), e)
        })
    }

    fn account_observers(&self) -> Vec<Arc<dyn AccountObserver>> {
        self.account_observers.lock().clone()
    }

    fn sync_observers(&self) -> Vec<Arc<dyn SyncStatusObserver>> {
        self.sync_observers.lock().clone()
    }
}

fn profile_for(account: &Account) -> Profile {
    let display_name = account
        .email
        .split('@')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    Profile {
        uid: Some(account.uid.clone()),
        email: Some(account.email.clone()),
        display_name,
        avatar_url: None,
    }
}

#[async_trait]
impl AccountManager for LocalAccountManager {
    fn authenticated_account(&self) -> Option<Account> {
        self.state.lock().account.clone()
    }

    fn account_needs_reauth(&self) -> bool {
        self.state
            .lock()
            .account
            .as_ref()
            .is_some_and(|a| a.needs_reauth)
    }

    fn account_profile(&self) -> Option<Profile> {
        self.state.lock().account.as_ref().map(profile_for)
    }

    async fn begin_authentication(&self) -> Result<Option<String>> {
        let server = self.auth_server.trim_end_matches('/');
        if server.is_empty() {
            return Ok(None);
        }

        let oauth_state = uuid::Uuid::new_v4().simple().to_string();
        let url = format!(
            "{server}/authorization?action=email&response_type=code&scope=profile+sync&state={oauth_state}"
        );
        let mut state = self.state.lock();
        state.pending_state = Some(oauth_state);
        self.save(&state)?;
        Ok(Some(url))
    }

    async fn logout(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.account = None;
            state.pending_state = None;
            self.save(&state)?;
        }
        tracing::info!("Signed out");
        for observer in self.account_observers() {
            observer.on_logged_out();
        }
        Ok(())
    }

    async fn sync_now(&self, reason: SyncReason, debounce: bool) -> Result<()> {
        tracing::debug!(?reason, debounce, "Sync requested");
        let observers = self.sync_observers();
        for observer in &observers {
            observer.on_started();
        }

        let failure = match self.authenticated_account() {
            None => Some("Not signed in"),
            Some(account) if account.needs_reauth => Some("Account needs reconnecting"),
            Some(_) => None,
        };
        if let Some(message) = failure {
            let error = SyncFailure::new(message);
            for observer in &observers {
                observer.on_error(Some(&error));
            }
            return Err(AppError::account(message));
        }

        for observer in &observers {
            observer.on_idle();
        }
        Ok(())
    }

    async fn update_profile(&self) -> Result<()> {
        if let Some(profile) = self.account_profile() {
            for observer in self.account_observers() {
                observer.on_profile_updated(&profile);
            }
        }
        Ok(())
    }

    async fn refresh_devices(&self) -> Result<bool> {
        Ok(self.authenticated_account().is_some())
    }

    fn register(&self, observer: Arc<dyn AccountObserver>) {
        self.account_observers.lock().push(observer);
    }

    fn register_for_sync_events(
        &self,
        observer: Arc<dyn SyncStatusObserver>,
        scope: LifecycleScope,
        sync_on_subscribe: bool,
    ) {
        tracing::trace!(?scope, sync_on_subscribe, "Sync observer registered");
        self.sync_observers.lock().push(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::application::testing::RecordingListener;

    fn manager(dir: &Path) -> LocalAccountManager {
        LocalAccountManager::load(&dir.join("account.json"), "https://auth.example/").unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_survives_reload() {
        let dir = tempdir().unwrap();
        let first = manager(dir.path());
        assert!(first.authenticated_account().is_none());

        let url = first.begin_authentication().await.unwrap().unwrap();
        assert!(url.starts_with("https://auth.example/authorization?"));

        // A second process finishes the flow.
        let second = manager(dir.path());
        assert!(second.has_pending_sign_in());
        let account = second.finish_authentication("someone@example.com").unwrap();

        let third = manager(dir.path());
        assert_eq!(third.authenticated_account(), Some(account));
        assert!(!third.has_pending_sign_in());
        assert_eq!(
            third.account_profile().and_then(|p| p.display_name).as_deref(),
            Some("someone")
        );
    }

    #[tokio::test]
    async fn test_finish_without_pending_sign_in_fails() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        assert!(matches!(
            manager.finish_authentication("someone@example.com"),
            Err(AppError::Account { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_server_yields_no_url() {
        let dir = tempdir().unwrap();
        let manager = LocalAccountManager::load(&dir.path().join("account.json"), "").unwrap();
        assert_eq!(manager.begin_authentication().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_observers_see_sign_in_sync_and_logout() {
        let dir = tempdir().unwrap();
        let manager = manager(dir.path());
        let listener = RecordingListener::new();
        manager.register(listener.clone());
        manager.register_for_sync_events(listener.clone(), LifecycleScope::Process, false);

        assert!(manager.sync_now(SyncReason::User, false).await.is_err());
        manager.begin_authentication().await.unwrap();
        manager.finish_authentication("someone@example.com").unwrap();
        manager.sync_now(SyncReason::User, false).await.unwrap();
        manager.logout().await.unwrap();

        assert_eq!(
            listener.events(),
            vec![
                "started",
                "error: Not signed in",
                "authenticated someone@example.com Signin",
                "started",
                "idle",
                "logged out",
            ]
        );
        assert!(manager.authenticated_account().is_none());
    }
}
