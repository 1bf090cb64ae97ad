//! Tagsweep main entry point
//!
//! This is the command-line interface for the Tagsweep metadata harvester.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use tagsweep::config::{load_config_with_hash, Config};
use tagsweep::crawler::{run_harvest, CancelSignal};
use tagsweep::output::{load_statistics, print_statistics};
use tagsweep::search::page_offset;
use tagsweep::storage::open_store;
use tracing_subscriber::EnvFilter;

/// Tagsweep: a paginated metadata harvester
///
/// Tagsweep walks a tag-filtered search endpoint page by page, follows every
/// result to its detail page, and stores each work once in SQLite, keyed by
/// title and release date unless the config selects the title alone.
#[derive(Parser, Debug)]
#[command(name = "tagsweep")]
#[command(version = "1.0.0")]
#[command(about = "A paginated metadata harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Drop previously stored records before harvesting
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the query that would be sent without harvesting
    #[arg(long, conflicts_with_all = ["stats", "fresh"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "fresh"])]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(config, config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tagsweep=info,warn"),
            1 => EnvFilter::new("tagsweep=debug,info"),
            2 => EnvFilter::new("tagsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the first request
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let query = config.query()?;

    println!("=== Tagsweep Dry Run ===\n");

    println!("Search:");
    println!("  Endpoint: {}", config.search.url);
    println!("  Tags: {}", query.tags_param());
    println!("  Rating range: {}", query.range_param());
    println!("  Sort: {}", query.sort());

    let first_page = reqwest::Url::parse_with_params(&config.search.url, query.params(page_offset(0)))
        .with_context(|| format!("Invalid search URL: {}", config.search.url))?;
    println!("  First request: {}", first_page);

    println!("\nCrawler:");
    println!("  Detail delay: {}ms", config.crawler.detail_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Max page retries: {}", config.crawler.max_page_retries);
    println!("  Retry backoff: {}ms", config.crawler.retry_backoff_ms);
    println!("  Detail workers: {}", config.crawler.detail_workers);

    println!("\nUser Agent: {}", config.user_agent.name);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Natural key: {}", config.output.natural_key.columns().join(" + "));

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let store = open_store(
        Path::new(&config.output.database_path),
        config.output.natural_key,
    )?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh harvest (stored records will be dropped)");
    } else {
        tracing::info!("Starting harvest (already stored records are kept)");
    }

    let cancel = CancelSignal::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current record");
            handle.cancel();
        }
    });

    match run_harvest(config, config_hash, fresh, cancel).await {
        Ok(stats) => {
            tracing::info!(
                "Harvest completed: {} new record(s), {} duplicate(s), {} skipped",
                stats.inserted,
                stats.duplicates,
                stats.fetch_failures
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
