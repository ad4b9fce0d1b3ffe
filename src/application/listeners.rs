//! Listener traits exposed to UI components.
//!
//! Every method has an empty default so a listener only implements the
//! callbacks it cares about. All callbacks run on the delivery context.

use crate::domain::{Account, AuthType, Profile, SyncFailure};

/// Account-level events.
pub trait AccountObserver: Send + Sync {
    fn on_authenticated(&self, _account: &Account, _auth_type: AuthType) {}

    fn on_authentication_problems(&self) {}

    fn on_logged_out(&self) {}

    fn on_profile_updated(&self, _profile: &Profile) {}
}

/// Sync engine lifecycle events.
pub trait SyncStatusObserver: Send + Sync {
    fn on_started(&self) {}

    fn on_idle(&self) {}

    fn on_error(&self, _error: Option<&SyncFailure>) {}
}

/// Bookmark store changes.
pub trait BookmarkListener: Send + Sync {
    fn on_bookmarks_updated(&self) {}

    /// A bookmark was created. Sent instead of `on_bookmarks_updated`.
    fn on_bookmark_added(&self) {}
}

/// History store changes.
pub trait HistoryListener: Send + Sync {
    fn on_history_updated(&self) {}
}
