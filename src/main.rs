//! Douban-Ripple main entry point
//!
//! This is the command-line interface for the Douban-Ripple social graph crawler.

use clap::Parser;
use douban_ripple::api::HttpApi;
use douban_ripple::config::{load_config_with_hash, Config};
use douban_ripple::crawler::{crawl, RunOutcome};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Douban-Ripple: a resumable breadth-first social graph crawler
///
/// Douban-Ripple walks friend and follow relations outward from a set of
/// seed people, storing everyone it meets in SQLite. Stop it at any time;
/// the next run picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "douban-ripple")]
#[command(version)]
#[command(about = "A resumable breadth-first social graph crawler", long_about = None)]
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

    /// Start from the seeds, ignoring the checkpoint files
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("douban_ripple=info,warn"),
            1 => EnvFilter::new("douban_ripple=debug,info"),
            2 => EnvFilter::new("douban_ripple=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Douban-Ripple Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Call timeout: {}s", config.api.call_timeout_secs);

    println!("\nCrawler Configuration:");
    println!("  Page size: {}", config.crawler.page_size);
    println!("  Minimum interval: {}ms", config.crawler.min_interval_ms);
    println!("  Retry backoff base: {}s", config.crawler.retry_base_secs);
    println!("  Ban backoff base: {}s", config.crawler.ban_backoff_secs);
    println!(
        "  Population estimate: {}",
        config.crawler.population_estimate
    );
    println!("  Checkpoint every: {} entries", config.crawler.checkpoint_every);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Queue checkpoint: {}", config.output.queue_path);
    println!("  Visited checkpoint: {}", config.output.visited_path);

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in config.crawler.seed_refs() {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use douban_ripple::output::{load_statistics, print_statistics};
    use douban_ripple::state::Checkpoint;
    use douban_ripple::storage::SqliteStorage;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    // Only report a frontier that was actually checkpointed
    let checkpoint = Checkpoint::from_config(&config.output);
    let frontier = if checkpoint.queue_path().exists() {
        Some(checkpoint.load(&[])?)
    } else {
        None
    };

    // Load statistics
    let stats = load_statistics(&storage, frontier.as_ref())?;

    // Print statistics
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, fresh: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting crawl from {} seeds (page size {}, {}ms between requests)",
        config.crawler.seeds.len(),
        config.crawler.page_size,
        config.crawler.min_interval_ms
    );

    // Validation guarantees a resolved key
    let api_key = config.api.api_key.as_deref().unwrap_or_default();
    let api = HttpApi::new(&config.api.base_url, api_key)?;

    // Run the crawler
    match crawl(config, api, fresh, shutdown_signal()).await {
        Ok(RunOutcome::Exhausted) => {
            tracing::info!("Crawl completed: frontier exhausted");
            Ok(())
        }
        Ok(RunOutcome::Interrupted) => {
            tracing::info!("Crawl interrupted; run again to resume");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Completes on Ctrl-C, or on SIGTERM where supported
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
