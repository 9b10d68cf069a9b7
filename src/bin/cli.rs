//! Harvester CLI
//!
//! Local execution entry point: one-shot runs, maintenance and the daily
//! scheduler.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use harvester::{
    config::load_config,
    error::Result,
    models::{Config, RunStatus, SavedFilter, Trigger},
    pipeline::{self, DailyScheduler, IngestionService},
    services::{ArticleCatalog, ListParams, build_adapters},
    storage::{ArticleStore, LocalStorage},
    utils::{http::HttpFetcher, text::to_iso_utc},
};
use serde::Serialize;

/// Harvester - coffee trade news ingestion
#[derive(Parser, Debug)]
#[command(
    name = "harvester",
    version,
    about = "Scheduled news ingestion for coffee-trade sources"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "harvester.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion cycle now
    Run,

    /// Show whether a run is active and the latest run
    Status,

    /// Probe every source and show the latest run
    Health,

    /// Evict unsaved articles outside the window
    Cleanup,

    /// List stored articles
    List {
        /// Look-back window in hours (1-168)
        #[arg(long, default_value_t = 24)]
        window_hours: u32,

        /// Saved filter: all, true or false
        #[arg(long, default_value = "all")]
        saved: SavedFilter,

        /// Only articles from this source
        #[arg(long)]
        source: Option<String>,

        /// Page size (1-200)
        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Mark an article as saved
    Save { id: String },

    /// Clear an article's saved flag
    Unsave { id: String },

    /// Delete an article
    Delete { id: String },

    /// Run the daily scheduler until Ctrl-C
    Serve,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open storage and record the configured sources.
async fn open_store(config: &Config) -> Result<Arc<LocalStorage>> {
    let store = Arc::new(LocalStorage::new(&config.storage.dir));
    store.register_sources(&config.sources, Utc::now()).await?;
    Ok(store)
}

fn ingestion_service(config: &Config, store: Arc<LocalStorage>) -> Result<Arc<IngestionService>> {
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let adapters = build_adapters(config, fetcher);
    log::info!("Built {} source adapters", adapters.len());
    Ok(Arc::new(IngestionService::new(
        config.ingestion.clone(),
        adapters,
        store,
    )))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli.config)?;
    log::debug!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Run => {
            let store = open_store(&config).await?;
            let service = ingestion_service(&config, store)?;
            let outcome = service.trigger_run(Trigger::Cli).await?;
            print_json(&outcome)?;

            let failed = outcome
                .run
                .as_ref()
                .is_none_or(|run| run.status == RunStatus::Failed);
            if failed {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Status => {
            let store = open_store(&config).await?;
            let service = ingestion_service(&config, store)?;
            print_json(&service.status_snapshot().await?)?;
        }

        Command::Health => {
            let store = open_store(&config).await?;
            let service = ingestion_service(&config, store)?;
            let sources = service.health_snapshot().await;
            let latest = service.status_snapshot().await?.last_run;
            print_json(&serde_json::json!({
                "timestamp_utc": to_iso_utc(Utc::now()),
                "latest_run": latest,
                "sources": sources,
            }))?;
        }

        Command::Cleanup => {
            let store = open_store(&config).await?;
            let now = Utc::now();
            let window_hours = config.ingestion.window_hours;
            let removed = pipeline::apply_retention(store.as_ref(), now, window_hours).await?;
            print_json(&serde_json::json!({
                "timestamp_utc": to_iso_utc(now),
                "window_hours": window_hours,
                "removed": removed,
            }))?;
        }

        Command::List {
            window_hours,
            saved,
            source,
            limit,
            offset,
        } => {
            let catalog = ArticleCatalog::new(open_store(&config).await?);
            let params = ListParams {
                window_hours,
                saved,
                source_id: source,
                limit,
                offset,
            };
            print_json(&catalog.list(&params).await?)?;
        }

        Command::Save { id } => {
            ArticleCatalog::new(open_store(&config).await?).save(&id).await?;
            print_json(&serde_json::json!({ "article_id": id, "is_saved": true }))?;
        }

        Command::Unsave { id } => {
            ArticleCatalog::new(open_store(&config).await?).unsave(&id).await?;
            print_json(&serde_json::json!({ "article_id": id, "is_saved": false }))?;
        }

        Command::Delete { id } => {
            ArticleCatalog::new(open_store(&config).await?).delete(&id).await?;
            print_json(&serde_json::json!({ "article_id": id, "deleted": true }))?;
        }

        Command::Serve => {
            if !config.scheduler.enabled {
                log::warn!("Scheduler is disabled in configuration; nothing to serve");
                return Ok(ExitCode::SUCCESS);
            }

            let store = open_store(&config).await?;
            let service = ingestion_service(&config, store)?;
            let handle = DailyScheduler::new(&config.scheduler)?.start(service);

            tokio::signal::ctrl_c().await?;
            log::info!("Shutdown requested");
            handle.stop().await;
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!(
                "✓ Config OK ({} sources, {} active)",
                config.sources.len(),
                config.active_sources().count()
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
