//! Application layer - stores and orchestration.
//!
//! This layer contains the listener fan-out, the sync bridge and the
//! account, bookmark and history stores built on the collaborator traits.

pub mod account_session;
pub mod bookmark_tree;
pub mod collaborators;
pub mod dispatcher;
pub mod formatter;
pub mod history_view;
pub mod listeners;
pub mod services;
pub mod sync_bridge;

#[cfg(test)]
pub mod testing;

pub use account_session::AccountSession;
pub use bookmark_tree::BookmarkTreeView;
pub use collaborators::{
    AccountManager, BookmarkStorage, HistoryStorage, LifecycleScope, PreferenceStore,
    SyncEngineStorage,
};
pub use dispatcher::{Deferred, DeliveryContext, EventDispatcher, MainLoop};
pub use formatter::{
    format_account_status, format_bookmarks_json, format_bookmarks_table, format_sync_status,
    format_visits_json, format_visits_table, OutputFormat,
};
pub use history_view::HistoryView;
pub use listeners::{AccountObserver, BookmarkListener, HistoryListener, SyncStatusObserver};
pub use services::{BrowserServices, Collaborators};
pub use sync_bridge::{SyncBridge, SyncRefresh};
