//! Output formatting for bookmarks, history and account state.
//!
//! Supports two output formats: table view and JSON.

use std::collections::HashMap;

use chrono::{Local, TimeZone};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{
    AccountStatus, BookmarkNode, BookmarkNodeType, Profile, SyncEngine, SyncPhase, SyncState,
    VisitInfo,
};

/// Output format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Formats bookmark nodes as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_bookmarks_json(nodes: &[BookmarkNode]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(nodes)
}

/// Formats a table listing of bookmark nodes.
pub fn format_bookmarks_table(nodes: &[BookmarkNode]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["GUID", "Type", "Title", "URL"]);

    for node in nodes {
        let kind = match node.node_type {
            BookmarkNodeType::Folder => "📁 Folder".to_string(),
            other => other.to_string(),
        };
        table.add_row(vec![
            node.guid.clone(),
            kind,
            truncate(node.title.as_deref().unwrap_or("-"), 35),
            truncate(node.url.as_deref().unwrap_or("-"), 50),
        ]);
    }

    table.to_string()
}

/// Formats visits as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_visits_json(visits: &[VisitInfo]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(visits)
}

/// Formats a table listing of visits.
pub fn format_visits_table(visits: &[VisitInfo]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Visited", "Type", "Title", "URL"]);

    for visit in visits {
        table.add_row(vec![
            format_millis(visit.visit_time),
            format!("{:?}", visit.visit_type),
            truncate(visit.title.as_deref().unwrap_or("-"), 35),
            truncate(&visit.url, 50),
        ]);
    }

    table.to_string()
}

/// Formats account status for display.
pub fn format_account_status(status: AccountStatus, profile: Option<&Profile>) -> String {
    let status_str = match status {
        AccountStatus::SignedIn => status.to_string().green(),
        AccountStatus::SignedOut => status.to_string().yellow(),
        AccountStatus::NeedsReconnect => status.to_string().red(),
    };
    let mut out = format!("{}\n  Status: {status_str}", "👤 Account".bold());

    if let Some(profile) = profile {
        if let Some(email) = &profile.email {
            out.push_str(&format!("\n  Email: {}", email.cyan()));
        }
        if let Some(name) = &profile.display_name {
            out.push_str(&format!("\n  Name: {name}"));
        }
    }

    out
}

/// Formats sync state and engine enablement for display.
pub fn format_sync_status(state: &SyncState, engines: &HashMap<SyncEngine, bool>) -> String {
    let phase = match state.phase() {
        SyncPhase::Idle => "idle".green(),
        SyncPhase::Syncing => "syncing".yellow(),
        SyncPhase::Error => "error".red(),
    };
    let last_sync = if state.last_sync_millis > 0 {
        format_millis(state.last_sync_millis)
    } else {
        "never".to_string()
    };

    let mut out = format!(
        "{}\n  State: {phase}\n  Last sync: {}",
        "🔄 Sync".bold(),
        last_sync.cyan()
    );
    if let Some(error) = &state.last_error {
        out.push_str(&format!("\n  Last error: {}", error.red()));
    }
    for engine in SyncEngine::ALL {
        let enabled = engines.get(&engine).copied().unwrap_or(false);
        let flag = if enabled { "on".green() } else { "off".dimmed() };
        out.push_str(&format!("\n  {engine}: {flag}"));
    }

    out
}

/// Formats epoch millis as local time.
fn format_millis(millis: i64) -> String {
    Local.timestamp_millis_opt(millis).single().map_or_else(
        || millis.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}

/// Truncates a string to max length with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{VisitType, MOBILE_ROOT_GUID};

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
        assert_eq!(truncate("ééééééééé", 5), "éé...");
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("table".parse::<OutputFormat>(), Ok(OutputFormat::Table)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("markdown".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_bookmarks_table_lists_every_node() {
        let nodes = vec![
            BookmarkNode::folder("folderAAAAAA", Some(MOBILE_ROOT_GUID.to_string()), None),
            BookmarkNode::item(
                "itemAAAAAAAA",
                MOBILE_ROOT_GUID,
                "https://example.com",
                Some("Example".to_string()),
            ),
        ];

        let table = format_bookmarks_table(&nodes);

        assert!(table.contains("folderAAAAAA"));
        assert!(table.contains("https://example.com"));
        assert!(table.contains("Example"));
    }

    #[test]
    fn test_visits_json_uses_numeric_visit_type() {
        let visits = vec![VisitInfo {
            url: "https://example.com".to_string(),
            title: None,
            visit_time: 1_700_000_000_000,
            visit_type: VisitType::Typed,
        }];

        let json = format_visits_json(&visits).unwrap();

        assert!(json.contains("\"visitType\": 2"));
    }

    #[test]
    fn test_sync_status_lists_engines() {
        let engines = HashMap::from([(SyncEngine::Bookmarks, true)]);
        let out = format_sync_status(&SyncState::default(), &engines);
        assert!(out.contains("never"));
        assert!(out.contains("bookmarks"));
        assert!(out.contains("history"));
    }
}
