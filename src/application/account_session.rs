//! Account session: sign-in state and account event fan-out.
//!
//! Wraps the external account manager. Every manager call is exposed as a
//! [`Deferred`] that completes on the delivery context; a failed call
//! resolves to `None` and is only logged.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::domain::{
    Account, AccountStatus, AuthType, LoginOrigin, Profile, Result, SyncEngine, SyncReason,
};

use super::collaborators::{AccountManager, PreferenceStore, SyncEngineStorage};
use super::dispatcher::{Deferred, DeliveryContext, EventDispatcher};
use super::listeners::{AccountObserver, SyncStatusObserver};
use super::sync_bridge::SyncBridge;

/// Process-wide account state and listener registry.
pub struct AccountSession {
    manager: Arc<dyn AccountManager>,
    engines: Arc<dyn SyncEngineStorage>,
    preferences: Arc<dyn PreferenceStore>,
    sync: Arc<SyncBridge>,
    context: DeliveryContext,
    status: Mutex<AccountStatus>,
    login_origin: Mutex<LoginOrigin>,
    listeners: EventDispatcher<dyn AccountObserver>,
}

/// Observer handed to the account manager. Holds the session weakly so
/// the manager does not keep it alive.
struct AccountEvents {
    session: Weak<AccountSession>,
}

impl AccountObserver for AccountEvents {
    fn on_authenticated(&self, account: &Account, auth_type: AuthType) {
        if let Some(session) = self.session.upgrade() {
            session.on_authenticated(account, auth_type);
        }
    }

    fn on_authentication_problems(&self) {
        if let Some(session) = self.session.upgrade() {
            session.on_authentication_problems();
        }
    }

    fn on_logged_out(&self) {
        if let Some(session) = self.session.upgrade() {
            session.on_logged_out();
        }
    }

    fn on_profile_updated(&self, profile: &Profile) {
        if let Some(session) = self.session.upgrade() {
            session.on_profile_updated(profile);
        }
    }
}

impl AccountSession {
    /// Create the session and subscribe it to account events.
    ///
    /// The initial status reflects whatever account the manager already has.
    pub fn new(
        manager: Arc<dyn AccountManager>,
        engines: Arc<dyn SyncEngineStorage>,
        preferences: Arc<dyn PreferenceStore>,
        sync: Arc<SyncBridge>,
        context: DeliveryContext,
    ) -> Arc<Self> {
        let status = AccountStatus::from_account(
            manager.authenticated_account().is_some(),
            manager.account_needs_reauth(),
        );
        tracing::debug!(%status, "Account session created");

        let session = Arc::new(Self {
            listeners: EventDispatcher::new("account", context.clone()),
            manager,
            engines,
            preferences,
            sync,
            context,
            status: Mutex::new(status),
            login_origin: Mutex::new(LoginOrigin::default()),
        });
        session.manager.register(Arc::new(AccountEvents {
            session: Arc::downgrade(&session),
        }));
        session
    }

    #[must_use]
    pub fn account_status(&self) -> AccountStatus {
        *self.status.lock()
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.account_status() == AccountStatus::SignedIn
    }

    #[must_use]
    pub fn login_origin(&self) -> LoginOrigin {
        *self.login_origin.lock()
    }

    pub fn set_login_origin(&self, origin: LoginOrigin) {
        *self.login_origin.lock() = origin;
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.sync.is_syncing()
    }

    #[must_use]
    pub fn last_sync_millis(&self) -> i64 {
        self.sync.last_sync_millis()
    }

    pub fn add_account_listener(&self, listener: Arc<dyn AccountObserver>) {
        self.listeners.register(listener);
    }

    pub fn remove_account_listener(&self, listener: &Arc<dyn AccountObserver>) {
        self.listeners.unregister(listener);
    }

    pub fn remove_all_account_listeners(&self) {
        self.listeners.clear();
    }

    pub fn add_sync_listener(&self, listener: Arc<dyn SyncStatusObserver>) {
        self.sync.add_listener(listener);
    }

    pub fn remove_sync_listener(&self, listener: &Arc<dyn SyncStatusObserver>) {
        self.sync.remove_listener(listener);
    }

    pub fn remove_all_sync_listeners(&self) {
        self.sync.remove_all_listeners();
    }

    /// Ask the manager to start an OAuth flow.
    pub fn auth_url(&self) -> Deferred<String> {
        let manager = Arc::clone(&self.manager);
        self.context.defer(async move {
            recovered("begin_authentication", manager.begin_authentication().await).flatten()
        })
    }

    /// Refresh the signed-in account's device list.
    pub fn refresh_devices(&self) -> Deferred<bool> {
        let manager = Arc::clone(&self.manager);
        self.context.defer(async move {
            manager.authenticated_account()?;
            recovered("refresh_devices", manager.refresh_devices().await)
        })
    }

    pub fn update_profile(&self) -> Deferred<()> {
        let manager = Arc::clone(&self.manager);
        self.context
            .defer(async move { recovered("update_profile", manager.update_profile().await) })
    }

    pub fn sync_now(&self, reason: SyncReason, debounce: bool) -> Deferred<()> {
        let manager = Arc::clone(&self.manager);
        self.context
            .defer(async move { recovered("sync_now", manager.sync_now(reason, debounce).await) })
    }

    pub fn logout(&self) -> Deferred<()> {
        let manager = Arc::clone(&self.manager);
        self.context
            .defer(async move { recovered("logout", manager.logout().await) })
    }

    /// Produce a URL to start signing in, or `None`.
    ///
    /// A fully signed-in account is logged out instead. Accounts that need
    /// a reconnect go through the normal sign-in flow.
    pub fn get_authentication_url(&self) -> Deferred<String> {
        let manager = Arc::clone(&self.manager);
        let runtime = self.context.runtime().clone();
        self.context.defer(async move {
            if manager.authenticated_account().is_some() && !manager.account_needs_reauth() {
                tracing::debug!("Already signed in, logging out instead of authenticating");
                recovered("logout", manager.logout().await);
                return None;
            }

            let request = {
                let manager = Arc::clone(&manager);
                runtime.spawn(async move { manager.begin_authentication().await })
            };

            match request.await {
                Ok(Ok(Some(url))) => {
                    tracing::debug!(url = %url, "Got an authentication url");
                    Some(url)
                }
                Ok(Ok(None)) => {
                    tracing::debug!("Account manager returned no authentication url");
                    recovered("logout", manager.logout().await);
                    None
                }
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Error obtaining authentication url");
                    None
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Authentication url request interrupted");
                    None
                }
            }
        })
    }

    /// Persist the preference for `engine` and apply it to the sync engine.
    ///
    /// # Errors
    /// Returns error if either setting cannot be written.
    pub fn set_sync_engine_enabled(&self, engine: SyncEngine, enabled: bool) -> Result<()> {
        self.preferences.set_sync_enabled(engine, enabled)?;
        self.engines.set_status(engine, enabled)?;
        tracing::info!(%engine, enabled, "Sync engine toggled");
        Ok(())
    }

    #[must_use]
    pub fn is_engine_enabled(&self, engine: SyncEngine) -> bool {
        self.engine_status().get(&engine).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn engine_status(&self) -> HashMap<SyncEngine, bool> {
        self.engines.get_status()
    }

    #[must_use]
    pub fn account_profile(&self) -> Option<Profile> {
        self.manager.account_profile()
    }

    fn set_status(&self, status: AccountStatus) {
        let previous = std::mem::replace(&mut *self.status.lock(), status);
        if previous != status {
            tracing::info!(from = %previous, to = %status, "Account status changed");
        }
    }

    fn apply_sync_preferences(&self) {
        for engine in SyncEngine::ALL {
            let enabled = self.preferences.sync_enabled(engine);
            if let Err(e) = self.engines.set_status(engine, enabled) {
                tracing::warn!(%engine, error = %e, "Failed to apply sync engine status");
            }
        }
    }
}

impl AccountObserver for AccountSession {
    fn on_authenticated(&self, account: &Account, auth_type: AuthType) {
        self.set_status(AccountStatus::SignedIn);
        self.apply_sync_preferences();

        let manager = Arc::clone(&self.manager);
        self.context.spawn(async move {
            recovered(
                "sync_now",
                manager.sync_now(SyncReason::EngineChange, false).await,
            );
        });
        let manager = Arc::clone(&self.manager);
        self.context.spawn(async move {
            recovered("refresh_devices", manager.refresh_devices().await);
        });

        let account = account.clone();
        self.listeners
            .dispatch(move |l| l.on_authenticated(&account, auth_type));
    }

    fn on_authentication_problems(&self) {
        self.set_status(AccountStatus::NeedsReconnect);
        self.listeners.dispatch(|l| l.on_authentication_problems());
    }

    fn on_logged_out(&self) {
        self.set_status(AccountStatus::SignedOut);
        self.listeners.dispatch(|l| l.on_logged_out());
    }

    fn on_profile_updated(&self, profile: &Profile) {
        let profile = profile.clone();
        self.listeners
            .dispatch(move |l| l.on_profile_updated(&profile));
    }
}

/// Log a failed account manager call and drop the error.
fn recovered<T>(operation: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(operation, error = %e, "Account manager call failed");
            None
        }
    }
}
