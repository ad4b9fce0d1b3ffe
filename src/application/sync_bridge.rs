//! Bridge between the sync engine's lifecycle and the stores.
//!
//! Subscribes once to the account manager's sync events, keeps the
//! running/idle state, republishes every signal to sync listeners and
//! tells the data stores to refresh when a sync finishes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::domain::{SyncFailure, SyncPhase, SyncState};

use super::collaborators::{AccountManager, LifecycleScope};
use super::dispatcher::{DeliveryContext, EventDispatcher};
use super::listeners::SyncStatusObserver;

/// A store whose persisted data a finished sync may have changed.
pub trait SyncRefresh: Send + Sync {
    fn on_sync_finished(&self);
}

/// Tracks sync lifecycle and fans it out.
pub struct SyncBridge {
    state: Mutex<SyncState>,
    listeners: EventDispatcher<dyn SyncStatusObserver>,
    refresh: Vec<Arc<dyn SyncRefresh>>,
}

impl SyncBridge {
    /// Create a bridge that is not yet subscribed to any engine.
    #[must_use]
    pub fn new(context: DeliveryContext, refresh: Vec<Arc<dyn SyncRefresh>>) -> Self {
        Self {
            state: Mutex::new(SyncState::default()),
            listeners: EventDispatcher::new("sync", context),
            refresh,
        }
    }

    /// Create a bridge and subscribe it to the manager's sync events.
    pub fn attach(
        manager: &dyn AccountManager,
        context: DeliveryContext,
        refresh: Vec<Arc<dyn SyncRefresh>>,
    ) -> Arc<Self> {
        let bridge = Arc::new(Self::new(context, refresh));
        manager.register_for_sync_events(bridge.clone(), LifecycleScope::Process, false);
        bridge
    }

    /// Snapshot of the current sync state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state.lock().clone()
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.state.lock().phase()
    }

    #[must_use]
    pub fn is_syncing(&self) -> bool {
        self.state.lock().is_syncing
    }

    #[must_use]
    pub fn last_sync_millis(&self) -> i64 {
        self.state.lock().last_sync_millis
    }

    pub fn add_listener(&self, listener: Arc<dyn SyncStatusObserver>) {
        self.listeners.register(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SyncStatusObserver>) {
        self.listeners.unregister(listener);
    }

    pub fn remove_all_listeners(&self) {
        self.listeners.clear();
    }

    fn update(&self, f: impl FnOnce(SyncState) -> SyncState) {
        let mut state = self.state.lock();
        *state = f(std::mem::take(&mut *state));
    }
}

impl SyncStatusObserver for SyncBridge {
    fn on_started(&self) {
        self.update(SyncState::syncing);
        tracing::debug!("Sync started");
        self.listeners.dispatch(|l| l.on_started());
    }

    fn on_idle(&self) {
        self.update(SyncState::completed);
        tracing::debug!(
            last_sync = self.last_sync_millis(),
            "Sync finished, notifying stores"
        );
        self.listeners.dispatch(|l| l.on_idle());

        for store in &self.refresh {
            store.on_sync_finished();
        }
    }

    fn on_error(&self, error: Option<&SyncFailure>) {
        let message = error.map_or_else(|| "unknown sync error".to_string(), ToString::to_string);
        self.update(|state| state.with_error(message));
        tracing::warn!(error = ?error, "Sync failed");

        let error = error.cloned();
        self.listeners.dispatch(move |l| l.on_error(error.as_ref()));
    }
}
