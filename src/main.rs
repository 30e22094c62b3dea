//! md-directory main entry point
//!
//! This is the command-line interface for the md-directory crawler.

use clap::Parser;
use md_directory::config::{load_config_with_hash, load_run_input, validate, Config};
use md_directory::crawler::{Crawler, ProxyConfiguration};
use md_directory::output::{export_records, load_statistics, print_statistics};
use md_directory::storage::SqliteStorage;
use md_directory::DirectoryError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// md-directory: a physician directory crawler
///
/// Walks the directory from its top-level listing down to one region's
/// practitioner pages and stores one record per practitioner in SQLite.
#[derive(Parser, Debug)]
#[command(name = "md-directory")]
#[command(version = "1.0.0")]
#[command(about = "A physician directory crawler", long_about = None)]
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

    /// Actor-style JSON input overriding the [input] and [proxy] sections
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Region to crawl, overriding both the config file and --input
    #[arg(long, value_name = "NAME")]
    region: Option<String>,

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring previous state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Export stored records as JSON Lines and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), DirectoryError> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_effective_config(&cli)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.export {
        handle_export(&config)
    } else {
        handle_crawl(&config, &config_hash, cli.fresh).await
    }
}

/// Loads the config file, then applies `--input` and `--region` on top
fn load_effective_config(cli: &Cli) -> Result<(Config, String), DirectoryError> {
    let (mut config, config_hash) = load_config_with_hash(&cli.config)?;

    if let Some(input_path) = &cli.input {
        tracing::info!("Applying run input from: {}", input_path.display());
        load_run_input(input_path)?.apply(&mut config);
    }
    if let Some(region) = &cli.region {
        config.input.target_region = region.clone();
    }

    validate(&config)?;
    Ok((config, config_hash))
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("md_directory=info,warn"),
            1 => EnvFilter::new("md_directory=debug,info"),
            2 => EnvFilter::new("md_directory=trace,debug"),
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
fn handle_dry_run(config: &Config) -> Result<(), DirectoryError> {
    println!("=== md-directory Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!(
        "  Desired concurrency: {}",
        config.crawler.desired_concurrency
    );
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );
    println!(
        "  Max pages per listing: {}",
        config.crawler.max_pages_per_listing
    );
    println!(
        "  Max request retries: {}",
        config.crawler.max_request_retries
    );

    println!("\nSessions:");
    println!("  Max pool size: {}", config.sessions.max_pool_size);
    println!("  Max usage count: {}", config.sessions.max_usage_count);
    println!("  Max error score: {}", config.sessions.max_error_score);

    let proxy = ProxyConfiguration::from_input(&config.proxy)?;
    println!("\nEgress: {}", proxy.describe());

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Export: {}", config.output.export_path);

    println!("\n✓ Configuration is valid");
    if config.input.target_region.trim().is_empty() {
        println!("! No target region set, the crawl would stop at the top-level listing");
    } else {
        println!(
            "✓ Would crawl region '{}' starting at {}",
            config.input.target_region, config.crawler.seed_url
        );
    }

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), DirectoryError> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes stored records as JSON Lines
fn handle_export(config: &Config) -> Result<(), DirectoryError> {
    println!("=== Exporting Records ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.export_path);
    println!();

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let written = export_records(&storage, Path::new(&config.output.export_path), None)?;

    println!("✓ {} record(s) exported to: {}", written, config.output.export_path);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: &str,
    fresh: bool,
) -> Result<(), DirectoryError> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume if interrupted run exists)");
    }
    tracing::info!("Target region: '{}'", config.input.target_region);

    let crawler = Crawler::new(config, config_hash, fresh)?;

    match crawler.run().await {
        Ok(report) => {
            if report.interrupted {
                tracing::warn!("Crawl interrupted; run it again to resume");
            } else {
                tracing::info!("Crawl completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            if let Err(mark_error) = crawler.mark_failed() {
                tracing::warn!(
                    "Could not mark run {} as failed: {}",
                    crawler.run_id(),
                    mark_error
                );
            }
            Err(e)
        }
    }
}
