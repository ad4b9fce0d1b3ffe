//! Contracts for the external systems the stores sit on top of.
//!
//! The account manager, engine status storage, preferences and the places
//! storage are all provided from outside; the stores only talk to them
//! through these traits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    Account, BookmarkNode, PageObservation, Profile, Result, SyncEngine, SyncReason, VisitInfo,
    VisitType,
};

use super::listeners::{AccountObserver, SyncStatusObserver};

/// Lifetime an observer registration is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleScope {
    /// Lives as long as the process.
    Process,
}

/// Firefox-account style account manager with a sync engine behind it.
///
/// Observers registered here are called from whatever thread the manager
/// uses; the stores marshal everything onto the delivery context.
#[async_trait]
pub trait AccountManager: Send + Sync {
    fn authenticated_account(&self) -> Option<Account>;

    fn account_needs_reauth(&self) -> bool;

    fn account_profile(&self) -> Option<Profile>;

    /// Start an OAuth flow. `Ok(None)` if no URL could be produced.
    async fn begin_authentication(&self) -> Result<Option<String>>;

    async fn logout(&self) -> Result<()>;

    async fn sync_now(&self, reason: SyncReason, debounce: bool) -> Result<()>;

    async fn update_profile(&self) -> Result<()>;

    /// Refresh the signed-in account's device list.
    async fn refresh_devices(&self) -> Result<bool>;

    fn register(&self, observer: Arc<dyn AccountObserver>);

    fn register_for_sync_events(
        &self,
        observer: Arc<dyn SyncStatusObserver>,
        scope: LifecycleScope,
        sync_on_subscribe: bool,
    );
}

/// Which engines take part in sync.
pub trait SyncEngineStorage: Send + Sync {
    fn set_status(&self, engine: SyncEngine, enabled: bool) -> Result<()>;

    fn get_status(&self) -> HashMap<SyncEngine, bool>;
}

/// User preferences for which data to sync after signing in.
pub trait PreferenceStore: Send + Sync {
    fn sync_enabled(&self, engine: SyncEngine) -> bool;

    fn set_sync_enabled(&self, engine: SyncEngine, enabled: bool) -> Result<()>;
}

/// Places bookmark storage.
#[async_trait]
pub trait BookmarkStorage: Send + Sync {
    /// Load a node with its full subtree. `None` if the GUID is unknown.
    async fn get_tree(&self, guid: &str) -> Result<Option<BookmarkNode>>;

    /// Insert a bookmark and return its GUID. Appends when `position` is `None`.
    async fn add_item(
        &self,
        parent_guid: &str,
        url: &str,
        title: &str,
        position: Option<u32>,
    ) -> Result<String>;

    /// Delete a node and everything under it. Returns whether it existed.
    async fn delete_node(&self, guid: &str) -> Result<bool>;

    async fn get_bookmarks_with_url(&self, url: &str) -> Result<Vec<BookmarkNode>>;
}

/// Places history storage.
#[async_trait]
pub trait HistoryStorage: Send + Sync {
    /// Every visited URL.
    async fn get_visited(&self) -> Result<Vec<String>>;

    /// Visits at or after `start` (epoch millis), newest first.
    async fn get_detailed_visits(
        &self,
        start: i64,
        exclude_types: &[VisitType],
    ) -> Result<Vec<VisitInfo>>;

    async fn record_visit(&self, url: &str, visit_type: VisitType) -> Result<()>;

    async fn record_observation(&self, url: &str, observation: &PageObservation) -> Result<()>;

    async fn delete_visit(&self, url: &str, timestamp: i64) -> Result<()>;

    async fn delete_visits_for(&self, url: &str) -> Result<()>;

    async fn delete_everything(&self) -> Result<()>;

    async fn delete_visits_since(&self, since: i64) -> Result<()>;

    async fn delete_visits_between(&self, start: i64, end: i64) -> Result<()>;

    /// Whether each of `urls` was visited, in the same order.
    async fn get_visited_for(&self, urls: &[String]) -> Result<Vec<bool>>;
}
