//! Crawler module - quota-bounded crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - The in-run frontier of listing and detail pages
//! - The fetch primitive with retry logic
//! - Fetch/extract tasks and the worker pool that runs them
//! - The run supervisor (seeding, deadline, drain, summary)

mod dispatcher;
mod fetcher;
mod frontier;
mod supervisor;
mod task;

pub use dispatcher::{CrawledBook, Dispatcher};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use frontier::{Frontier, PageKind, WorkItem};
pub use supervisor::{RunRequest, RunSummary, Supervisor, MAX_KEYWORD_CHARS};
pub use task::{run_task, TaskOutcome};

use crate::config::Config;
use crate::storage::open_gate;
use crate::HoundError;
use tokio_util::sync::CancellationToken;

/// Runs one search with the store and HTTP client described by `config`
///
/// This is the main entry point for a single run. It will:
/// 1. Open the book store (or fall back to memory / an unavailable gate)
/// 2. Build the HTTP client for the request's proxy
/// 3. Crawl until the target, the listing end, or the deadline
/// 4. Record the run and return its summary
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `request` - Keyword, target, proxy, and concurrency for this run
/// * `config_hash` - Hash recorded with the run history
/// * `cancel` - Stops the run early (e.g. on Ctrl-C); the summary is still built
pub async fn crawl(
    config: Config,
    request: RunRequest,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<RunSummary, HoundError> {
    let gate = open_gate(&config.store);
    let supervisor = Supervisor::new(config, gate).with_config_hash(config_hash);
    let summary = supervisor.run_with_cancellation(request, cancel).await;

    if let Some(store) = supervisor.gate().store() {
        if let Err(e) = store.close() {
            tracing::warn!("Failed to close book store: {}", e);
        }
    }

    summary
}
