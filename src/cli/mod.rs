//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

mod console;

use clap::{Parser, Subcommand};

use crate::application::OutputFormat;
use crate::domain::{SyncEngine, VisitType, MOBILE_ROOT_GUID};

pub use console::ConsoleListener;

/// Browser Sync - bookmarks, history and account sync from the command line.
#[derive(Parser, Debug)]
#[command(name = "browser-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table")]
    pub format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bookmark tree operations.
    #[command(subcommand)]
    Bookmarks(BookmarkCommands),

    /// Browsing history operations.
    #[command(subcommand)]
    History(HistoryCommands),

    /// Account sign-in and profile.
    #[command(subcommand)]
    Account(AccountCommands),

    /// Sync state and engine toggles.
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Show data paths being used.
    Paths,
}

#[derive(Subcommand, Debug)]
pub enum BookmarkCommands {
    /// List the children of a folder.
    List {
        /// Folder GUID (the mobile root if not specified).
        #[arg(default_value = MOBILE_ROOT_GUID)]
        guid: String,
    },

    /// Bookmark a URL in the mobile root.
    Add {
        url: String,

        /// Bookmark title (the URL if not specified).
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Remove a bookmark by URL, or any node with --id.
    Remove {
        /// URL, or node GUID with --id.
        target: String,

        /// Treat the target as a node GUID.
        #[arg(long)]
        id: bool,
    },

    /// Check whether a URL is bookmarked.
    Check { url: String },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommands {
    /// List visits, newest first.
    List {
        /// Maximum number of visits to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Only print the distinct visited URLs.
        #[arg(long)]
        urls: bool,
    },

    /// Record a visit.
    Visit {
        url: String,

        /// Visit type: link, typed, bookmark, reload, ...
        #[arg(short = 't', long = "type", default_value = "link")]
        visit_type: VisitType,
    },

    /// Record the page title of a URL.
    Title { url: String, title: String },

    /// Delete visits of a URL, or a single visit with --at.
    Delete {
        url: String,

        /// Only the visit at this time (epoch millis).
        #[arg(long)]
        at: Option<i64>,
    },

    /// Delete visits in a time range, or everything.
    Clear {
        /// Delete visits at or after this time (epoch millis).
        #[arg(long)]
        since: Option<i64>,

        /// Only delete visits up to this time (epoch millis), requires --since.
        #[arg(long, requires = "since")]
        until: Option<i64>,
    },

    /// Check whether URLs were visited.
    Check {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommands {
    /// Show sign-in status.
    Status,

    /// Start signing in and print the authentication URL.
    Login,

    /// Finish a sign-in started with `login`.
    Confirm { email: String },

    /// Sign out.
    Logout,

    /// Refresh and show the account profile.
    Profile,
}

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Sync now.
    Now {
        /// Allow the account manager to skip a sync that ran recently.
        #[arg(long)]
        debounce: bool,
    },

    /// Enable syncing an engine.
    Enable { engine: SyncEngine },

    /// Disable syncing an engine.
    Disable { engine: SyncEngine },

    /// Show sync state and engine status.
    Status,
}

impl Cli {
    /// Parse the output format argument.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        self.format.parse()
    }
}
