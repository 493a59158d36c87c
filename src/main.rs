//! Bookhound main entry point
//!
//! This is the command-line interface for the Bookhound book crawler.

use anyhow::Context;
use bookhound::config::{load_config_with_hash, validate, Config};
use bookhound::crawler::{crawl, RunRequest};
use bookhound::output::{
    format_books, load_statistics, print_statistics, print_summary, summary_to_json,
};
use bookhound::storage::{open_storage, BookStore};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Bookhound: a quota-bounded book crawler
///
/// Bookhound searches a bookstore for a keyword, walks the result pages,
/// and collects book details until it has the requested number of new
/// books, runs out of results, or hits its deadline.
#[derive(Parser, Debug)]
#[command(name = "bookhound")]
#[command(version)]
#[command(about = "A quota-bounded book crawler", long_about = None)]
struct Cli {
    /// Search keyword
    #[arg(value_name = "KEYWORD", required_unless_present_any = ["stats", "books"])]
    keyword: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, default_value = "bookhound.toml")]
    config: PathBuf,

    /// Number of new books to collect (0 = unlimited)
    #[arg(short, long)]
    target: Option<u64>,

    /// Proxy URL for this run (http, https, or socks5)
    #[arg(long)]
    proxy: Option<String>,

    /// Number of concurrent workers
    #[arg(long)]
    concurrency: Option<u32>,

    /// Deduplicate in memory only; do not open the database
    #[arg(long)]
    no_store: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "books")]
    stats: bool,

    /// List stored books for a keyword and exit
    #[arg(long, value_name = "KEYWORD", conflicts_with = "stats")]
    books: Option<String>,

    /// Maximum number of books listed by --books
    #[arg(long, default_value_t = 50)]
    limit: usize,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = load_configuration(&cli.config)?;
    if cli.no_store {
        config.store.enabled = false;
    }

    if cli.stats {
        handle_stats(&config)
    } else if let Some(keyword) = &cli.books {
        handle_books(&config, keyword, cli.limit)
    } else {
        handle_crawl(config, &config_hash, &cli).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bookhound=info,warn"),
            1 => EnvFilter::new("bookhound=debug,info"),
            2 => EnvFilter::new("bookhound=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration file, or the defaults when it does not exist
fn load_configuration(path: &Path) -> anyhow::Result<(Config, String)> {
    if !path.exists() {
        tracing::info!(
            "No configuration at {}, using defaults",
            path.display()
        );
        let config = Config::default();
        validate(&config)?;
        return Ok((config, String::new()));
    }

    tracing::info!("Loading configuration from: {}", path.display());
    let (config, hash) = load_config_with_hash(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);
    Ok((config, hash))
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.store.database_path);

    let store = open_storage(Path::new(&config.store.database_path))?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);
    store.close()?;

    Ok(())
}

/// Handles the --books mode: lists the most recent stored books for a keyword
fn handle_books(config: &Config, keyword: &str, limit: usize) -> anyhow::Result<()> {
    let store = open_storage(Path::new(&config.store.database_path))?;
    let books = store.books_by_keyword(keyword, limit)?;
    store.close()?;

    println!("=== Stored books for \"{}\" ({}) ===\n", keyword, books.len());
    print!("{}", format_books(&books));

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str, cli: &Cli) -> anyhow::Result<()> {
    let keyword = cli
        .keyword
        .clone()
        .context("a search keyword is required")?;

    let mut request = RunRequest::from_config(keyword, &config.crawler);
    if let Some(target) = cli.target {
        request.target = target;
    }
    if let Some(concurrency) = cli.concurrency {
        request.concurrency = concurrency;
    }
    if cli.proxy.is_some() {
        request.proxy = cli.proxy.clone();
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping run");
            ctrl_c.cancel();
        }
    });

    let summary = match crawl(config, request, config_hash, cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    if cli.json {
        println!("{}", summary_to_json(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}
