//! Process-wide wiring of the stores.
//!
//! Built once at startup. The sync bridge is subscribed before the account
//! session so the first authentication already reaches both stores.

use std::sync::Arc;

use crate::domain::RootTitles;

use super::account_session::AccountSession;
use super::bookmark_tree::BookmarkTreeView;
use super::collaborators::{
    AccountManager, BookmarkStorage, HistoryStorage, PreferenceStore, SyncEngineStorage,
};
use super::dispatcher::DeliveryContext;
use super::history_view::HistoryView;
use super::sync_bridge::{SyncBridge, SyncRefresh};

/// External systems the stores are built on.
pub struct Collaborators {
    pub account_manager: Arc<dyn AccountManager>,
    pub engines: Arc<dyn SyncEngineStorage>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub bookmarks: Arc<dyn BookmarkStorage>,
    pub history: Arc<dyn HistoryStorage>,
}

/// The account, bookmark and history stores of one browsing profile.
pub struct BrowserServices {
    pub account: Arc<AccountSession>,
    pub sync: Arc<SyncBridge>,
    pub bookmarks: Arc<BookmarkTreeView>,
    pub history: Arc<HistoryView>,
    context: DeliveryContext,
}

impl BrowserServices {
    #[must_use]
    pub fn new(collaborators: Collaborators, titles: RootTitles, context: DeliveryContext) -> Self {
        let Collaborators {
            account_manager,
            engines,
            preferences,
            bookmarks,
            history,
        } = collaborators;

        let bookmarks = Arc::new(BookmarkTreeView::new(bookmarks, titles, context.clone()));
        let history = Arc::new(HistoryView::new(history, context.clone()));
        let refresh: Vec<Arc<dyn SyncRefresh>> = vec![bookmarks.clone(), history.clone()];

        let sync = SyncBridge::attach(account_manager.as_ref(), context.clone(), refresh);
        let account = AccountSession::new(
            account_manager,
            engines,
            preferences,
            Arc::clone(&sync),
            context.clone(),
        );
        tracing::debug!(status = %account.account_status(), "Browser services ready");

        Self {
            account,
            sync,
            bookmarks,
            history,
            context,
        }
    }

    #[must_use]
    pub const fn context(&self) -> &DeliveryContext {
        &self.context
    }

    /// Drop every listener and wait for deliveries already queued.
    pub async fn shutdown(&self) {
        self.account.remove_all_account_listeners();
        self.account.remove_all_sync_listeners();
        self.bookmarks.remove_all_listeners();
        self.history.remove_all_listeners();
        self.context.flush().await;
        tracing::debug!("Browser services shut down");
    }
}
