//! Sift CLI - capture links and notes from the terminal
//!
//! Every mutation applies locally first and syncs in the background model of
//! the app: with no remote configured the CLI runs fully offline and queues
//! everything for a later `sift sync`.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sift_core::db::{Database, ItemStore, LibSqlItemStore};
use sift_core::gateway::HttpItemGateway;
use sift_core::util::is_http_url;
use sift_core::{ConnectivityMonitor, Item, ItemDraft, ItemId, ItemPatch, ItemStatus, SyncEngine};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Stash links and notes for the week's newsletter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Quick capture: sift https://example.com or sift "a thought"
    #[arg(trailing_var_arg = true)]
    capture: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a new item
    #[command(alias = "new")]
    Add {
        /// Link to stash
        #[arg(long)]
        url: Option<String>,
        /// Item title
        #[arg(long)]
        title: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Newsletter category
        #[arg(long)]
        category: Option<String>,
    },
    /// List items
    List {
        /// Which items to show
        #[arg(long, value_enum, default_value_t = StatusArg::Active)]
        status: StatusArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an item's fields
    Edit {
        /// Item ID or unique ID prefix
        id: String,
        /// New link
        #[arg(long)]
        url: Option<String>,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New notes
        #[arg(long)]
        notes: Option<String>,
        /// New category
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete an item
    Delete {
        /// Item ID or unique ID prefix
        id: String,
    },
    /// Archive this week's active items
    Archive,
    /// Show pending operations waiting for connectivity
    Queue,
    /// Replay pending operations and refresh from the remote store
    Sync,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum StatusArg {
    Active,
    Archived,
    Deleted,
}

impl From<StatusArg> for ItemStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Active => Self::Active,
            StatusArg::Archived => Self::Archived,
            StatusArg::Deleted => Self::Deleted,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] sift_core::Error),
    #[error(transparent)]
    Gateway(#[from] sift_core::gateway::GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Nothing to capture")]
    EmptyCapture,
    #[error("Item not found for id/prefix: {0}")]
    ItemNotFound(String),
    #[error("Multiple items match prefix: {0}")]
    AmbiguousItemId(String),
    #[error("Sync is not configured. Set SIFT_API_URL (and optionally SIFT_API_TOKEN) to enable `sift sync`.")]
    SyncNotConfigured,
}

type Engine = SyncEngine<LibSqlItemStore, HttpItemGateway>;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sift=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let remote = resolve_remote_config();
    let engine = open_engine(&db_path, remote.as_ref()).await?;

    match cli.command {
        Some(Commands::Add {
            url,
            title,
            notes,
            category,
        }) => {
            run_add(
                &engine,
                ItemDraft {
                    url,
                    title,
                    notes,
                    category,
                },
            )
            .await?;
        }
        Some(Commands::List { status, json }) => run_list(&engine, status.into(), json).await?,
        Some(Commands::Edit {
            id,
            url,
            title,
            notes,
            category,
        }) => {
            run_edit(
                &engine,
                &id,
                ItemPatch {
                    url,
                    title,
                    notes,
                    category,
                },
            )
            .await?;
        }
        Some(Commands::Delete { id }) => run_delete(&engine, &id).await?,
        Some(Commands::Archive) => run_archive(&engine).await?,
        Some(Commands::Queue) => run_queue(&engine).await?,
        Some(Commands::Sync) => {
            if remote.is_none() {
                return Err(CliError::SyncNotConfigured);
            }
            run_sync(&engine).await?;
        }
        None => {
            if cli.capture.is_empty() {
                use clap::CommandFactory;
                Cli::command().print_help().map_err(CliError::Io)?;
                println!();
            } else {
                run_add(&engine, draft_from_capture(&cli.capture)).await?;
            }
        }
    }

    Ok(())
}

/// Remote endpoint and token from the environment.
struct RemoteConfig {
    api_url: String,
    api_token: Option<String>,
}

fn resolve_remote_config() -> Option<RemoteConfig> {
    let api_url = env::var("SIFT_API_URL").ok().filter(|v| !v.trim().is_empty())?;
    let api_token = env::var("SIFT_API_TOKEN").ok().filter(|v| !v.trim().is_empty());
    Some(RemoteConfig { api_url, api_token })
}

fn resolve_db_path(flag: Option<PathBuf>) -> PathBuf {
    if let Some(path) = flag {
        return path;
    }
    if let Ok(path) = env::var("SIFT_DB_PATH") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sift")
        .join("sift.db")
}

async fn open_engine(db_path: &Path, remote: Option<&RemoteConfig>) -> Result<Engine, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::debug!("opening database at {}", db_path.display());
    let store = LibSqlItemStore::new(Database::open(db_path).await?);

    let (gateway, online) = match remote {
        Some(config) => (
            HttpItemGateway::new(config.api_url.clone(), config.api_token.clone())?,
            true,
        ),
        // Never contacted: the monitor reports offline, so every mutation
        // queues locally and `sift sync` refuses to run.
        None => (HttpItemGateway::new("http://offline.invalid", None)?, false),
    };

    Ok(SyncEngine::new(store, gateway, ConnectivityMonitor::new(online)))
}

fn draft_from_capture(parts: &[String]) -> ItemDraft {
    let text = parts.join(" ").trim().to_string();
    if is_http_url(&text) {
        ItemDraft {
            url: Some(text),
            ..ItemDraft::default()
        }
    } else {
        ItemDraft {
            notes: Some(text),
            ..ItemDraft::default()
        }
    }
}

async fn run_add(engine: &Engine, draft: ItemDraft) -> Result<(), CliError> {
    if draft.url.is_none() && draft.title.is_none() && draft.notes.is_none() {
        return Err(CliError::EmptyCapture);
    }
    let item = engine.create_item(draft).await?;
    println!("{}", item.id);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ItemListEntry {
    id: String,
    preview: String,
    url: Option<String>,
    category: Option<String>,
    week_of: String,
    status: &'static str,
    synced: bool,
}

fn to_list_entry(item: &Item) -> ItemListEntry {
    ItemListEntry {
        id: item.id.to_string(),
        preview: preview_line(item),
        url: item.url.clone(),
        category: item.category.clone(),
        week_of: item.week_of.to_string(),
        status: item.status.as_str(),
        synced: item.synced,
    }
}

/// First usable line of an item, truncated for terminal output.
fn preview_line(item: &Item) -> String {
    let source = item
        .title
        .as_deref()
        .or(item.url.as_deref())
        .or(item.notes.as_deref())
        .unwrap_or("");
    source.lines().next().unwrap_or("").chars().take(72).collect()
}

async fn run_list(engine: &Engine, status: ItemStatus, as_json: bool) -> Result<(), CliError> {
    let items = engine.store().list_by_status(status).await?;

    if as_json {
        let entries: Vec<ItemListEntry> = items.iter().map(to_list_entry).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No {} items.", status.as_str());
        return Ok(());
    }
    for item in &items {
        let marker = if item.synced { " " } else { "*" };
        println!(
            "{marker} {}  [{}]  {}",
            item.id,
            item.week_of,
            preview_line(item)
        );
    }
    Ok(())
}

async fn run_edit(engine: &Engine, id: &str, patch: ItemPatch) -> Result<(), CliError> {
    let resolved = resolve_item_id(engine, id).await?;
    let updated = engine.update_item(&resolved, patch).await?;
    println!("{}", updated.id);
    Ok(())
}

async fn run_delete(engine: &Engine, id: &str) -> Result<(), CliError> {
    let resolved = resolve_item_id(engine, id).await?;
    engine.delete_item(&resolved).await?;
    println!("{resolved}");
    Ok(())
}

async fn run_archive(engine: &Engine) -> Result<(), CliError> {
    let (week_of, archived) = engine.archive_current_week().await?;
    println!("Archived {archived} items for week {week_of}");
    Ok(())
}

async fn run_queue(engine: &Engine) -> Result<(), CliError> {
    let ops = engine.store().list_queue().await?;
    if ops.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }
    for queued in &ops {
        println!(
            "{:>4}  {:<7}  {}",
            queued.queue_id,
            queued.op.kind(),
            queued.op.target()
        );
    }
    Ok(())
}

async fn run_sync(engine: &Engine) -> Result<(), CliError> {
    let report = engine.full_sync().await?;
    println!(
        "Synced {} queued operations ({} still pending), refreshed {} items",
        report.synced, report.failed, report.refreshed
    );
    Ok(())
}

/// Resolve a full id or unique prefix against the local store.
async fn resolve_item_id(engine: &Engine, query: &str) -> Result<ItemId, CliError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(CliError::ItemNotFound(String::new()));
    }

    let exact = ItemId::from(query);
    if engine.store().get(&exact).await?.is_some() {
        return Ok(exact);
    }

    let mut matches = Vec::new();
    for status in [ItemStatus::Active, ItemStatus::Archived, ItemStatus::Deleted] {
        for item in engine.store().list_by_status(status).await? {
            if item.id.as_str().starts_with(query) {
                matches.push(item.id);
            }
        }
    }

    match matches.len() {
        0 => Err(CliError::ItemNotFound(query.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(CliError::AmbiguousItemId(query.to_string())),
    }
}
