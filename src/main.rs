//! Browser Sync - manage synced bookmarks, history and the sync account.
//!
//! Runs the bookmark, history and account stores against a local places
//! database and a file-backed account, printing every store notification.
//!
//! QUICK START:
//!   browser-sync bookmarks add https://example.com -t Example
//!   browser-sync bookmarks list fake_desktop_root
//!   browser-sync history visit https://example.com --type typed
//!   browser-sync account login               # then: account confirm <email>
//!   browser-sync sync now

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;
use serde_json::json;
use tokio::runtime::Handle;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use browser_sync_store::application::{
    format_account_status, format_bookmarks_json, format_bookmarks_table, format_sync_status,
    format_visits_json, format_visits_table, BookmarkTreeView, BrowserServices, Collaborators,
    DeliveryContext, OutputFormat,
};
use browser_sync_store::cli::{
    AccountCommands, BookmarkCommands, Cli, Commands, ConsoleListener, HistoryCommands,
    SyncCommands,
};
use browser_sync_store::domain::{
    AppConfig, AppError, LoginOrigin, PageObservation, SyncEngine, SyncReason,
};
use browser_sync_store::infrastructure::{
    config_file_path, ensure_config_exists, load_config, LocalAccountManager, PlacesDb,
    SettingsFile,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {e:#}", "Error:".red().bold());
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli
        .output_format()
        .map_err(|message| AppError::Config { message })?;

    ensure_config_exists()?;
    let config = load_config()?;

    if matches!(cli.command, Commands::Paths) {
        cmd_paths(&config);
        return Ok(());
    }

    let (context, main_loop) = DeliveryContext::new(Handle::current());
    tokio::spawn(main_loop.run());

    let places = Arc::new(
        PlacesDb::open(&config.places_db_path()).context("Failed to open places database")?,
    );
    let accounts = Arc::new(LocalAccountManager::load(
        &config.account_file_path(),
        config.account.auth_server.clone(),
    )?);
    let settings = Arc::new(SettingsFile::new(config.clone(), config_file_path()));
    let services = BrowserServices::new(
        Collaborators {
            account_manager: accounts.clone(),
            engines: settings.clone(),
            preferences: settings,
            bookmarks: places.clone(),
            history: places,
        },
        config.titles.clone(),
        context,
    );

    let listener = Arc::new(match format {
        OutputFormat::Table => ConsoleListener::default(),
        OutputFormat::Json => ConsoleListener::quiet(),
    });
    services.account.add_account_listener(listener.clone());
    services.account.add_sync_listener(listener.clone());
    services.bookmarks.add_listener(listener.clone());
    services.history.add_listener(listener.clone());

    let result = match cli.command {
        Commands::Bookmarks(command) => cmd_bookmarks(&services, command, format).await,
        Commands::History(command) => cmd_history(&services, command, format).await,
        Commands::Account(command) => cmd_account(&services, &accounts, command, format).await,
        Commands::Sync(command) => cmd_sync(&services, command, format).await,
        Commands::Paths => Ok(()),
    };

    services.shutdown().await;
    tracing::debug!(notifications = ?listener.seen(), "Done");

    result
}

/// Bookmark commands.
async fn cmd_bookmarks(
    services: &BrowserServices,
    command: BookmarkCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let bookmarks = &services.bookmarks;

    match command {
        BookmarkCommands::List { guid } => {
            let nodes = bookmarks.get_children(&guid).await?;
            match format {
                OutputFormat::Table => {
                    println!("{}", format_bookmarks_table(&nodes));
                    println!("Total: {} node(s)", nodes.len());
                }
                OutputFormat::Json => {
                    println!("{}", format_bookmarks_json(&nodes).map_err(AppError::json_parse)?);
                }
            }
        }
        BookmarkCommands::Add { url, title } => {
            let title = title.unwrap_or_else(|| url.clone());
            let guid = bookmarks.add_bookmark(&url, &title).await?;
            print_result(format, json!({ "guid": guid, "url": url }), || {
                format!("{} Bookmarked {} ({guid})", "✓".green().bold(), url.cyan())
            });
        }
        BookmarkCommands::Remove { target, id: true } => {
            // Inverted name: true means the node is a built-in root.
            if BookmarkTreeView::guid_allows_deletion(&target) {
                bail!("{target} is a built-in folder and cannot be removed");
            }
            let removed = bookmarks.delete_by_id(&target).await?;
            print_removed(format, &target, removed);
        }
        BookmarkCommands::Remove { target, id: false } => {
            let removed = bookmarks.delete_by_url(&target).await?;
            print_removed(format, &target, removed);
        }
        BookmarkCommands::Check { url } => {
            let bookmarked = bookmarks.is_bookmarked(&url).await?;
            print_result(format, json!({ "url": url, "bookmarked": bookmarked }), || {
                if bookmarked {
                    format!("{} {} is bookmarked", "✓".green().bold(), url.cyan())
                } else {
                    format!("{} {} is not bookmarked", "✗".red(), url.cyan())
                }
            });
        }
    }

    Ok(())
}

/// History commands.
async fn cmd_history(
    services: &BrowserServices,
    command: HistoryCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let history = &services.history;

    match command {
        HistoryCommands::List { limit, urls: true } => {
            let mut urls = history.get_history().await?;
            urls.truncate(limit);
            print_result(format, json!(urls), || urls.join("\n"));
        }
        HistoryCommands::List { limit, urls: false } => {
            let mut visits = history.get_detailed_history().await?;
            visits.truncate(limit);
            match format {
                OutputFormat::Table => println!("{}", format_visits_table(&visits)),
                OutputFormat::Json => {
                    println!("{}", format_visits_json(&visits).map_err(AppError::json_parse)?);
                }
            }
        }
        HistoryCommands::Visit { url, visit_type } => {
            history.record_visit(&url, visit_type).await?;
            print_result(format, json!({ "url": url, "recorded": true }), || {
                format!("{} Recorded visit to {}", "✓".green().bold(), url.cyan())
            });
        }
        HistoryCommands::Title { url, title } => {
            let observation = PageObservation { title: Some(title) };
            history.record_observation(&url, &observation).await?;
            print_result(format, json!({ "url": url, "recorded": true }), || {
                format!("{} Updated title of {}", "✓".green().bold(), url.cyan())
            });
        }
        HistoryCommands::Delete { url, at: Some(at) } => {
            history.delete_by_url_and_timestamp(&url, at).await?;
            print_result(format, json!({ "url": url, "at": at }), || {
                format!("{} Deleted visit to {} at {at}", "✓".green().bold(), url.cyan())
            });
        }
        HistoryCommands::Delete { url, at: None } => {
            history.delete_all_visits_for(&url).await?;
            print_result(format, json!({ "url": url }), || {
                format!("{} Deleted all visits to {}", "✓".green().bold(), url.cyan())
            });
        }
        HistoryCommands::Clear { since, until } => {
            let scope = match (since, until) {
                (Some(since), Some(until)) => {
                    history.delete_visits_between(since, until).await?;
                    format!("between {since} and {until}")
                }
                (Some(since), None) => {
                    history.delete_visits_since(since).await?;
                    format!("since {since}")
                }
                _ => {
                    history.delete_everything().await?;
                    "all time".to_string()
                }
            };
            print_result(format, json!({ "cleared": scope }), || {
                format!("{} Cleared history ({scope})", "✓".green().bold())
            });
        }
        HistoryCommands::Check { urls } => {
            let visited = if let [url] = urls.as_slice() {
                vec![history.is_in_history(url).await?]
            } else {
                history.get_visited(&urls).await?
            };
            let rows: Vec<_> = urls.iter().zip(&visited).collect();
            print_result(
                format,
                json!(rows
                    .iter()
                    .map(|(url, seen)| json!({ "url": url, "visited": seen }))
                    .collect::<Vec<_>>()),
                || {
                    rows.iter()
                        .map(|(url, seen)| {
                            let mark = if **seen { "✓".green() } else { "✗".red() };
                            format!("{mark} {url}")
                        })
                        .collect::<Vec<_>>()
                        .join("\n")
                },
            );
        }
    }

    Ok(())
}

/// Account commands.
async fn cmd_account(
    services: &BrowserServices,
    accounts: &LocalAccountManager,
    command: AccountCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let account = &services.account;

    match command {
        AccountCommands::Status => print_account(services, format),
        AccountCommands::Login => {
            account.set_login_origin(LoginOrigin::Settings);
            let was_signed_in = account.is_signed_in();
            match account.get_authentication_url().await {
                Some(url) => print_result(format, json!({ "url": url }), || {
                    format!(
                        "{} Open this URL to sign in:\n  {}\nThen run: browser-sync account confirm <email>",
                        "🔑".bold(),
                        url.cyan()
                    )
                }),
                None if was_signed_in => print_result(format, json!({ "url": null }), || {
                    "Already signed in; signed out instead".to_string()
                }),
                None => bail!("Could not get an authentication URL"),
            }
        }
        AccountCommands::Confirm { email } => {
            accounts.finish_authentication(&email)?;
            wait_for_sync(services).await;
            print_account(services, format);
        }
        AccountCommands::Logout => {
            if account.logout().await.is_none() {
                bail!("Sign out failed");
            }
            print_account(services, format);
        }
        AccountCommands::Profile => {
            if account.update_profile().await.is_none() {
                bail!("Profile refresh failed");
            }
            let profile = account.account_profile();
            print_result(format, json!(profile), || match &profile {
                Some(profile) => format!(
                    "{}\n  UID: {}\n  Email: {}\n  Name: {}",
                    "👤 Profile".bold(),
                    profile.uid.as_deref().unwrap_or("-"),
                    profile.email.as_deref().unwrap_or("-").cyan(),
                    profile.display_name.as_deref().unwrap_or("-")
                ),
                None => "Not signed in".yellow().to_string(),
            });
        }
    }

    Ok(())
}

/// Sync commands.
async fn cmd_sync(
    services: &BrowserServices,
    command: SyncCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let account = &services.account;

    match command {
        SyncCommands::Now { debounce } => {
            let reason = if debounce {
                SyncReason::Scheduled
            } else {
                SyncReason::User
            };
            if account.sync_now(reason, debounce).await.is_none() {
                let error = services.sync.state().last_error.unwrap_or_default();
                bail!("Sync failed: {error}");
            }
            print_sync(services, format);
        }
        SyncCommands::Enable { engine } => toggle_engine(services, engine, true, format)?,
        SyncCommands::Disable { engine } => toggle_engine(services, engine, false, format)?,
        SyncCommands::Status => print_sync(services, format),
    }

    Ok(())
}

fn toggle_engine(
    services: &BrowserServices,
    engine: SyncEngine,
    enabled: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    services
        .account
        .set_sync_engine_enabled(engine, enabled)
        .with_context(|| format!("Failed to update {engine} sync"))?;
    print_result(format, json!({ "engine": engine, "enabled": enabled }), || {
        let state = if enabled { "enabled".green() } else { "disabled".yellow() };
        format!("{} {engine} sync {state}", "✓".green().bold())
    });
    Ok(())
}

/// Show data paths command.
fn cmd_paths(config: &AppConfig) {
    println!("{}", "📂 Browser Sync Paths".bold());
    println!();

    let paths = [
        ("data", config.data_dir()),
        ("config", config_file_path()),
        ("places", config.places_db_path()),
        ("account", config.account_file_path()),
    ];
    for (label, path) in paths {
        let marker = if path.exists() { "✓".green() } else { "✗".red() };
        println!("  {marker} [{}] {}", label.cyan(), path.display());
    }
}

/// Wait for the sync that follows a sign-in, giving up after a few seconds.
async fn wait_for_sync(services: &BrowserServices) {
    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = services.sync.state();
            if !state.is_syncing && (state.last_sync_millis > 0 || state.last_error.is_some()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if settled.is_err() {
        tracing::warn!("Timed out waiting for the first sync");
    }
}

fn print_account(services: &BrowserServices, format: OutputFormat) {
    let account = &services.account;
    let status = account.account_status();
    let profile = account.account_profile();
    print_result(
        format,
        json!({ "status": status, "signedIn": account.is_signed_in(), "profile": profile }),
        || format_account_status(status, profile.as_ref()),
    );
}

fn print_sync(services: &BrowserServices, format: OutputFormat) {
    let state = services.sync.state();
    let engines = services.account.engine_status();
    let enabled: serde_json::Map<String, serde_json::Value> = SyncEngine::ALL
        .into_iter()
        .map(|engine| {
            let on = services.account.is_engine_enabled(engine);
            (engine.to_string(), serde_json::Value::Bool(on))
        })
        .collect();
    print_result(
        format,
        json!({ "state": state, "engines": enabled }),
        || format_sync_status(&state, &engines),
    );
}

fn print_removed(format: OutputFormat, target: &str, removed: bool) {
    print_result(format, json!({ "target": target, "removed": removed }), || {
        if removed {
            format!("{} Removed {}", "✓".green().bold(), target.cyan())
        } else {
            format!("{} Nothing to remove for {}", "✗".yellow(), target.cyan())
        }
    });
}

/// Print `value` as JSON, or the human-readable text.
fn print_result(format: OutputFormat, value: serde_json::Value, text: impl FnOnce() -> String) {
    match format {
        OutputFormat::Table => println!("{}", text()),
        OutputFormat::Json => match serde_json::to_string_pretty(&value) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::error!(error = %e, "Failed to serialize output"),
        },
    }
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
