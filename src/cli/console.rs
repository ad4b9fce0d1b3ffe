//! Prints store notifications to the terminal.

use colored::Colorize;
use parking_lot::Mutex;

use crate::application::{AccountObserver, BookmarkListener, HistoryListener, SyncStatusObserver};
use crate::domain::{Account, AuthType, Profile, SyncFailure};

/// Listener for every store; lines are printed as events are delivered.
#[derive(Default)]
pub struct ConsoleListener {
    quiet: bool,
    seen: Mutex<Vec<String>>,
}

impl ConsoleListener {
    /// A listener that only records, for JSON output.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    /// Every notification received so far.
    #[must_use]
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }

    fn note(&self, line: String) {
        if !self.quiet {
            println!("{} {line}", "🔔".dimmed());
        }
        self.seen.lock().push(line);
    }
}

impl AccountObserver for ConsoleListener {
    fn on_authenticated(&self, account: &Account, auth_type: AuthType) {
        self.note(format!("signed in as {} ({auth_type:?})", account.email.cyan()));
    }

    fn on_authentication_problems(&self) {
        self.note("account needs reconnecting".yellow().to_string());
    }

    fn on_logged_out(&self) {
        self.note("signed out".to_string());
    }

    fn on_profile_updated(&self, profile: &Profile) {
        self.note(format!(
            "profile updated: {}",
            profile.display_name.as_deref().unwrap_or("-")
        ));
    }
}

impl SyncStatusObserver for ConsoleListener {
    fn on_started(&self) {
        self.note("sync started".to_string());
    }

    fn on_idle(&self) {
        self.note("sync finished".green().to_string());
    }

    fn on_error(&self, error: Option<&SyncFailure>) {
        let reason = error.map_or_else(|| "unknown error".to_string(), ToString::to_string);
        self.note(format!("sync failed: {}", reason.red()));
    }
}

impl BookmarkListener for ConsoleListener {
    fn on_bookmarks_updated(&self) {
        self.note("bookmarks updated".to_string());
    }

    fn on_bookmark_added(&self) {
        self.note("bookmark added".to_string());
    }
}

impl HistoryListener for ConsoleListener {
    fn on_history_updated(&self) {
        self.note("history updated".to_string());
    }
}
