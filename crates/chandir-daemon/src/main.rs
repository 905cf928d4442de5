mod http;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chandir_core::config::Config;
use chandir_core::{serialize_lines, DirectoryManager, DirectoryState, RefreshOutcome};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "chandir", version, about = "Fetch, cache and search a channel directory")]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the local HTTP state API.
    Serve {
        /// Skip the refresh normally issued at startup.
        #[arg(long)]
        no_refresh: bool,
    },
    /// Fetch the directory once and update the cache.
    Refresh {
        /// Source URL; defaults to the configured endpoint.
        #[arg(long)]
        url: Option<String>,
    },
    /// Print the cached directory.
    List {
        /// Only show channels whose name contains this text.
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Print the cached directory in `name,url` line format.
    Export,
    /// Delete the cached directory.
    ClearCache,
}

fn init_logging() -> anyhow::Result<PathBuf> {
    let data_dir = chandir_core::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("chandir.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    // RUST_LOG overrides; keep HTTP client internals quiet by default.
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        "info,chandir_core=debug,chandir_daemon=debug,hyper=warn,hyper_util=warn,reqwest=warn"
            .to_string()
    });
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    Ok(log_path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_path = init_logging()?;
    eprintln!("chandir log: {}", log_path.display());

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!(
        "Config loaded from: {:?}",
        cli.config.clone().unwrap_or_else(Config::config_path)
    );

    // One manager per process, shared by every consumer below.
    let manager = Arc::new(DirectoryManager::from_config(&config)?);

    match cli.command {
        Command::Serve { no_refresh } => serve(config, manager, !no_refresh).await,
        Command::Refresh { url } => {
            let source = url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(manager.default_url());
            println!("refreshing from {}", source);
            let outcome = manager.refresh(url.as_deref()).await;
            report_refresh(&outcome, &manager.snapshot().await)
        }
        Command::List { search } => {
            if let Some(term) = search {
                manager.set_search_term(term).await;
            }
            print_listing(&manager.snapshot().await);
            Ok(())
        }
        Command::Export => {
            let state = manager.snapshot().await;
            if !state.records.is_empty() {
                println!("{}", serialize_lines(&state.records));
            }
            Ok(())
        }
        Command::ClearCache => {
            manager.clear_cache().await;
            println!("cache cleared");
            Ok(())
        }
    }
}

async fn serve(
    config: Config,
    manager: Arc<DirectoryManager>,
    refresh_on_start: bool,
) -> anyhow::Result<()> {
    if !config.http.enabled {
        warn!("HTTP API disabled in config; nothing to serve");
        anyhow::bail!("HTTP API is disabled (http.enabled = false)");
    }

    let _logger = spawn_event_logger(Arc::clone(&manager));
    if refresh_on_start {
        let _refresh = manager.spawn_refresh(None);
    }

    info!("chandir initialised, serving state API");
    http::serve(config.http.bind_address.clone(), config.http.port, manager).await
}

/// Follow state notifications and log each published revision.
fn spawn_event_logger(manager: Arc<DirectoryManager>) -> tokio::task::JoinHandle<()> {
    let mut rx = manager.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let state = manager.snapshot().await;
                    debug!(
                        "{:?}: {} channels, loading={}, error={:?}",
                        event,
                        state.records.len(),
                        state.is_loading(),
                        state.error()
                    );
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("Event logger skipped {} notifications", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn report_refresh(outcome: &RefreshOutcome, state: &DirectoryState) -> anyhow::Result<()> {
    match outcome {
        RefreshOutcome::Loaded { count } => {
            println!("loaded {} channels", count);
            Ok(())
        }
        RefreshOutcome::Failed(err) => {
            println!("keeping {} cached channels", state.records.len());
            anyhow::bail!("refresh failed: {}", err)
        }
        RefreshOutcome::Superseded => Ok(()),
    }
}

fn print_listing(state: &DirectoryState) {
    let visible = state.visible();
    for record in &visible {
        println!("{}  {:<32} {}", record.id, record.name, record.url);
    }

    let updated = state
        .last_refreshed
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "never".to_string());
    println!(
        "{} of {} channels (updated {})",
        visible.len(),
        state.records.len(),
        updated
    );
}
