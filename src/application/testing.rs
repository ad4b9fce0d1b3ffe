//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::domain::{
    Account, AppError, AuthType, BookmarkNode, PageObservation, Profile, Result, SyncEngine,
    SyncFailure, SyncReason, VisitInfo, VisitType, MENU_ROOT_GUID, MOBILE_ROOT_GUID, ROOT_GUID,
    TOOLBAR_ROOT_GUID, UNFILED_ROOT_GUID,
};

use super::collaborators::{
    AccountManager, BookmarkStorage, HistoryStorage, LifecycleScope, PreferenceStore,
    SyncEngineStorage,
};
use super::listeners::{AccountObserver, BookmarkListener, HistoryListener, SyncStatusObserver};

/// What `begin_authentication` does.
#[derive(Debug, Clone)]
pub enum AuthScript {
    Url(String),
    NoUrl,
    Fails,
    Panics,
}

/// Scripted account manager that emits sync lifecycle events on `sync_now`.
pub struct FakeAccountManager {
    account: Mutex<Option<Account>>,
    auth: Mutex<AuthScript>,
    logout_calls: AtomicUsize,
    begin_auth_calls: AtomicUsize,
    refresh_device_calls: AtomicUsize,
    sync_calls: Mutex<Vec<(SyncReason, bool)>>,
    account_observers: Mutex<Vec<Arc<dyn AccountObserver>>>,
    sync_observers: Mutex<Vec<Arc<dyn SyncStatusObserver>>>,
    sync_registrations: Mutex<Vec<(LifecycleScope, bool)>>,
    sync_fails: AtomicBool,
}

impl FakeAccountManager {
    fn with_account(account: Option<Account>) -> Self {
        Self {
            account: Mutex::new(account),
            auth: Mutex::new(AuthScript::Url("https://accounts.test/oauth".to_string())),
            logout_calls: AtomicUsize::new(0),
            begin_auth_calls: AtomicUsize::new(0),
            refresh_device_calls: AtomicUsize::new(0),
            sync_calls: Mutex::new(Vec::new()),
            account_observers: Mutex::new(Vec::new()),
            sync_observers: Mutex::new(Vec::new()),
            sync_registrations: Mutex::new(Vec::new()),
            sync_fails: AtomicBool::new(false),
        }
    }

    pub fn signed_out() -> Self {
        Self::with_account(None)
    }

    pub fn signed_in(needs_reauth: bool) -> Self {
        Self::with_account(Some(Account {
            needs_reauth,
            ..test_account()
        }))
    }

    pub fn script_auth(&self, script: AuthScript) {
        *self.auth.lock() = script;
    }

    pub fn fail_syncs(&self) {
        self.sync_fails.store(true, Ordering::SeqCst);
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn begin_auth_calls(&self) -> usize {
        self.begin_auth_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_device_calls(&self) -> usize {
        self.refresh_device_calls.load(Ordering::SeqCst)
    }

    pub fn sync_calls(&self) -> Vec<(SyncReason, bool)> {
        self.sync_calls.lock().clone()
    }

    pub fn sync_registrations(&self) -> Vec<(LifecycleScope, bool)> {
        self.sync_registrations.lock().clone()
    }

    fn account_observers(&self) -> Vec<Arc<dyn AccountObserver>> {
        self.account_observers.lock().clone()
    }

    pub fn emit_authenticated(&self, auth_type: AuthType) {
        let account = test_account();
        *self.account.lock() = Some(account.clone());
        for observer in self.account_observers() {
            observer.on_authenticated(&account, auth_type);
        }
    }

    pub fn emit_authentication_problems(&self) {
        for observer in self.account_observers() {
            observer.on_authentication_problems();
        }
    }

    pub fn emit_logged_out(&self) {
        *self.account.lock() = None;
        for observer in self.account_observers() {
            observer.on_logged_out();
        }
    }

    pub fn emit_profile_updated(&self) {
        for observer in self.account_observers() {
            observer.on_profile_updated(&test_profile());
        }
    }
}

pub fn test_account() -> Account {
    Account {
        uid: "uid-1".to_string(),
        email: "user@example.com".to_string(),
        needs_reauth: false,
    }
}

pub fn test_profile() -> Profile {
    Profile {
        uid: Some("uid-1".to_string()),
        email: Some("user@example.com".to_string()),
        display_name: Some("User".to_string()),
        avatar_url: None,
    }
}

#[async_trait]
impl AccountManager for FakeAccountManager {
    fn authenticated_account(&self) -> Option<Account> {
        self.account.lock().clone()
    }

    fn account_needs_reauth(&self) -> bool {
        self.account.lock().as_ref().is_some_and(|a| a.needs_reauth)
    }

    fn account_profile(&self) -> Option<Profile> {
        self.account.lock().as_ref().map(|_| test_profile())
    }

    async fn begin_authentication(&self) -> Result<Option<String>> {
        self.begin_auth_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.auth.lock().clone();
        match script {
            AuthScript::Url(url) => Ok(Some(url)),
            AuthScript::NoUrl => Ok(None),
            AuthScript::Fails => Err(AppError::account("auth server unreachable")),
            AuthScript::Panics => panic!("authentication request interrupted"),
        }
    }

    async fn logout(&self) -> Result<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *self.account.lock() = None;
        Ok(())
    }

    async fn sync_now(&self, reason: SyncReason, debounce: bool) -> Result<()> {
        self.sync_calls.lock().push((reason, debounce));
        let observers = self.sync_observers.lock().clone();
        for observer in &observers {
            observer.on_started();
        }
        if self.sync_fails.load(Ordering::SeqCst) {
            let failure = SyncFailure::new("sync failed");
            for observer in &observers {
                observer.on_error(Some(&failure));
            }
            return Err(AppError::account("sync failed"));
        }
        for observer in &observers {
            observer.on_idle();
        }
        Ok(())
    }

    async fn update_profile(&self) -> Result<()> {
        Ok(())
    }

    async fn refresh_devices(&self) -> Result<bool> {
        self.refresh_device_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
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
        self.sync_registrations.lock().push((scope, sync_on_subscribe));
        self.sync_observers.lock().push(observer);
    }
}

/// Preferences and engine status kept in memory.
pub struct MemorySettings {
    preferences: Mutex<HashMap<SyncEngine, bool>>,
    engines: Mutex<HashMap<SyncEngine, bool>>,
}

impl MemorySettings {
    pub fn new(bookmarks: bool, history: bool) -> Self {
        Self {
            preferences: Mutex::new(HashMap::from([
                (SyncEngine::Bookmarks, bookmarks),
                (SyncEngine::History, history),
            ])),
            engines: Mutex::new(HashMap::new()),
        }
    }
}

impl PreferenceStore for MemorySettings {
    fn sync_enabled(&self, engine: SyncEngine) -> bool {
        self.preferences.lock().get(&engine).copied().unwrap_or(true)
    }

    fn set_sync_enabled(&self, engine: SyncEngine, enabled: bool) -> Result<()> {
        self.preferences.lock().insert(engine, enabled);
        Ok(())
    }
}

impl SyncEngineStorage for MemorySettings {
    fn set_status(&self, engine: SyncEngine, enabled: bool) -> Result<()> {
        self.engines.lock().insert(engine, enabled);
        Ok(())
    }

    fn get_status(&self) -> HashMap<SyncEngine, bool> {
        self.engines.lock().clone()
    }
}

/// Flat in-memory bookmark tree seeded with the built-in roots.
pub struct MemoryBookmarks {
    nodes: Mutex<Vec<BookmarkNode>>,
    next_id: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryBookmarks {
    pub fn with_roots() -> Self {
        let root = BookmarkNode::folder(ROOT_GUID, None, Some(String::new()));
        let mut nodes = vec![root];
        for guid in [MENU_ROOT_GUID, TOOLBAR_ROOT_GUID, UNFILED_ROOT_GUID, MOBILE_ROOT_GUID] {
            nodes.push(BookmarkNode::folder(
                guid,
                Some(ROOT_GUID.to_string()),
                Some(format!("stored title of {guid}")),
            ));
        }
        Self::from_nodes(nodes)
    }

    pub fn empty() -> Self {
        Self::from_nodes(Vec::new())
    }

    fn from_nodes(nodes: Vec<BookmarkNode>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            next_id: AtomicUsize::new(1),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn insert_folder(&self, guid: &str, parent: &str, title: &str) {
        self.nodes.lock().push(BookmarkNode::folder(
            guid,
            Some(parent.to_string()),
            Some(title.to_string()),
        ));
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::InvalidData {
                message: "storage unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn build(nodes: &[BookmarkNode], guid: &str) -> Option<BookmarkNode> {
        let mut node = nodes.iter().find(|n| n.guid == guid)?.clone();
        if node.is_folder() {
            let children = nodes
                .iter()
                .filter(|n| n.parent_guid.as_deref() == Some(guid))
                .filter_map(|n| Self::build(nodes, &n.guid))
                .enumerate()
                .map(|(i, mut child)| {
                    child.position = u32::try_from(i).ok();
                    child
                })
                .collect();
            node.children = Some(children);
        }
        Some(node)
    }
}

#[async_trait]
impl BookmarkStorage for MemoryBookmarks {
    async fn get_tree(&self, guid: &str) -> Result<Option<BookmarkNode>> {
        self.check()?;
        Ok(Self::build(&self.nodes.lock(), guid))
    }

    async fn add_item(
        &self,
        parent_guid: &str,
        url: &str,
        title: &str,
        _position: Option<u32>,
    ) -> Result<String> {
        self.check()?;
        let guid = format!("item{:08}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.nodes.lock().push(BookmarkNode::item(
            guid.clone(),
            parent_guid,
            url,
            Some(title.to_string()),
        ));
        Ok(guid)
    }

    async fn delete_node(&self, guid: &str) -> Result<bool> {
        self.check()?;
        let mut nodes = self.nodes.lock();
        let before = nodes.len();
        nodes.retain(|n| n.guid != guid);
        Ok(nodes.len() != before)
    }

    async fn get_bookmarks_with_url(&self, url: &str) -> Result<Vec<BookmarkNode>> {
        self.check()?;
        // Mimic a case-insensitive index so exact matching is left to the caller.
        let needle = url.to_lowercase();
        Ok(self
            .nodes
            .lock()
            .iter()
            .filter(|n| n.url.as_deref().is_some_and(|u| u.to_lowercase() == needle))
            .cloned()
            .collect())
    }
}

/// History storage that records calls and keeps a visit list.
#[derive(Default)]
pub struct MemoryHistory {
    visits: Mutex<Vec<VisitInfo>>,
    calls: Mutex<Vec<String>>,
    last_exclude: Mutex<Option<(i64, Vec<VisitType>)>>,
}

impl MemoryHistory {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn last_exclude(&self) -> Option<(i64, Vec<VisitType>)> {
        self.last_exclude.lock().clone()
    }

    fn log(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl HistoryStorage for MemoryHistory {
    async fn get_visited(&self) -> Result<Vec<String>> {
        Ok(self.visits.lock().iter().map(|v| v.url.clone()).collect())
    }

    async fn get_detailed_visits(
        &self,
        start: i64,
        exclude_types: &[VisitType],
    ) -> Result<Vec<VisitInfo>> {
        *self.last_exclude.lock() = Some((start, exclude_types.to_vec()));
        Ok(self
            .visits
            .lock()
            .iter()
            .filter(|v| v.visit_time >= start && !exclude_types.contains(&v.visit_type))
            .cloned()
            .collect())
    }

    async fn record_visit(&self, url: &str, visit_type: VisitType) -> Result<()> {
        self.log(format!("record_visit {url}"));
        let visit_time = i64::try_from(self.visits.lock().len()).unwrap_or_default() + 1;
        self.visits.lock().push(VisitInfo {
            url: url.to_string(),
            title: None,
            visit_time,
            visit_type,
        });
        Ok(())
    }

    async fn record_observation(&self, url: &str, _observation: &PageObservation) -> Result<()> {
        self.log(format!("record_observation {url}"));
        Ok(())
    }

    async fn delete_visit(&self, url: &str, timestamp: i64) -> Result<()> {
        self.log(format!("delete_visit {url} {timestamp}"));
        self.visits
            .lock()
            .retain(|v| !(v.url == url && v.visit_time == timestamp));
        Ok(())
    }

    async fn delete_visits_for(&self, url: &str) -> Result<()> {
        self.log(format!("delete_visits_for {url}"));
        self.visits.lock().retain(|v| v.url != url);
        Ok(())
    }

    async fn delete_everything(&self) -> Result<()> {
        self.log("delete_everything");
        self.visits.lock().clear();
        Ok(())
    }

    async fn delete_visits_since(&self, since: i64) -> Result<()> {
        self.log(format!("delete_visits_since {since}"));
        self.visits.lock().retain(|v| v.visit_time < since);
        Ok(())
    }

    async fn delete_visits_between(&self, start: i64, end: i64) -> Result<()> {
        self.log(format!("delete_visits_between {start} {end}"));
        self.visits
            .lock()
            .retain(|v| v.visit_time < start || v.visit_time > end);
        Ok(())
    }

    async fn get_visited_for(&self, urls: &[String]) -> Result<Vec<bool>> {
        let visits = self.visits.lock();
        Ok(urls
            .iter()
            .map(|url| visits.iter().any(|v| &v.url == url))
            .collect())
    }
}

/// Listener for every store that records callbacks as strings.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    /// Wait until at least `count` events arrived, or give up after five seconds.
    pub async fn wait_for(&self, count: usize) -> Vec<String> {
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while self.events.lock().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "timed out waiting for {count} events: {:?}", self.events());
        self.events()
    }
}

impl AccountObserver for RecordingListener {
    fn on_authenticated(&self, account: &Account, auth_type: AuthType) {
        self.push(format!("authenticated {} {auth_type:?}", account.email));
    }

    fn on_authentication_problems(&self) {
        self.push("authentication problems");
    }

    fn on_logged_out(&self) {
        self.push("logged out");
    }

    fn on_profile_updated(&self, profile: &Profile) {
        self.push(format!(
            "profile {}",
            profile.display_name.as_deref().unwrap_or_default()
        ));
    }
}

impl SyncStatusObserver for RecordingListener {
    fn on_started(&self) {
        self.push("started");
    }

    fn on_idle(&self) {
        self.push("idle");
    }

    fn on_error(&self, error: Option<&SyncFailure>) {
        self.push(format!(
            "error: {}",
            error.map(ToString::to_string).unwrap_or_default()
        ));
    }
}

impl BookmarkListener for RecordingListener {
    fn on_bookmarks_updated(&self) {
        self.push("bookmarks updated");
    }

    fn on_bookmark_added(&self) {
        self.push("bookmark added");
    }
}

impl HistoryListener for RecordingListener {
    fn on_history_updated(&self) {
        self.push("history updated");
    }
}
