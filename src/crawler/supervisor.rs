//! Run supervisor - owns one orchestration run from seed to summary
//!
//! The supervisor seeds the frontier with the first listing page, starts the
//! worker pool, and waits for whichever comes first:
//! - the stop controller deciding the run is done (quota or crawl limit)
//! - every worker going idle with nothing left to do
//! - the wall-clock deadline
//! - caller cancellation
//!
//! It then drains: the run is stopped, in-flight workers get a grace period
//! to finish, and workers still busy after it are aborted and joined. The
//! summary is built only once no worker can touch the store again, so it
//! matches what was persisted. The summary is always returned.

use crate::config::{validate_proxy, Config, CrawlerConfig, MAX_CONCURRENCY};
use crate::crawler::dispatcher::{CrawledBook, Dispatcher};
use crate::crawler::fetcher::{Fetcher, HttpFetcher};
use crate::crawler::frontier::{Frontier, WorkItem};
use crate::extract::{BookPageExtractor, Extractor};
use crate::record::{BookRecord, DEDUP_KEY_LABEL};
use crate::state::{RunPhase, RunState, StopReason};
use crate::storage::{DedupGate, NewRun, RunOutcome, RunStatus};
use crate::url::build_listing_url;
use crate::HoundError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest accepted search keyword, in characters
pub const MAX_KEYWORD_CHARS: usize = 50;

/// Parameters of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Search keyword for the listing chain
    pub keyword: String,

    /// New records to collect; 0 means unlimited
    pub target: u64,

    /// Proxy for this run; falls back to the configured proxy
    pub proxy: Option<String>,

    /// Number of concurrent workers
    pub concurrency: u32,
}

impl RunRequest {
    /// Builds a request using the configured default target and concurrency
    pub fn from_config(keyword: impl Into<String>, config: &CrawlerConfig) -> Self {
        Self {
            keyword: keyword.into(),
            target: config.default_target,
            proxy: None,
            concurrency: config.concurrency,
        }
    }

    /// Validates the request against the crawler limits
    ///
    /// # Errors
    ///
    /// * Empty or over-long keyword
    /// * Target above `max_target`
    /// * Concurrency outside `1..=MAX_CONCURRENCY`
    /// * Unparseable proxy address
    pub fn validate(&self, config: &CrawlerConfig) -> Result<(), HoundError> {
        let keyword = self.keyword.trim();
        if keyword.is_empty() {
            return Err(HoundError::InvalidRequest(
                "keyword cannot be empty".to_string(),
            ));
        }
        if keyword.chars().count() > MAX_KEYWORD_CHARS {
            return Err(HoundError::InvalidRequest(format!(
                "keyword is longer than {} characters",
                MAX_KEYWORD_CHARS
            )));
        }

        if self.target > config.max_target {
            return Err(HoundError::InvalidRequest(format!(
                "target {} exceeds the maximum of {}",
                self.target, config.max_target
            )));
        }

        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(HoundError::InvalidRequest(format!(
                "concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            )));
        }

        if let Some(proxy) = &self.proxy {
            validate_proxy(proxy)?;
        }

        Ok(())
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub keyword: String,

    /// Every record that reached the dedup gate, whatever its verdict
    pub books: Vec<BookRecord>,

    pub total_crawled: u64,
    pub total_saved: u64,
    pub total_duplicates: u64,
    pub total_skipped: u64,
    pub total_failed: u64,

    /// Description of the key used for de-duplication
    pub dedup_key: String,

    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,

    /// Run history ID, when the store recorded the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<i64>,
}

/// Drives orchestration runs against one store and fetch primitive
pub struct Supervisor {
    config: Arc<Config>,
    gate: DedupGate,
    fetcher: Option<Arc<dyn Fetcher>>,
    extractor: Arc<dyn Extractor>,
    config_hash: String,
}

impl Supervisor {
    /// Creates a supervisor that fetches over HTTP with the configured client
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `gate` - Dedup gate over the book store
    pub fn new(config: Config, gate: DedupGate) -> Self {
        Self {
            config: Arc::new(config),
            gate,
            fetcher: None,
            extractor: Arc::new(BookPageExtractor::new()),
            config_hash: String::new(),
        }
    }

    /// Uses `fetcher` for every run instead of building an HTTP client
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Hash recorded with each run in the store's history
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    pub fn gate(&self) -> &DedupGate {
        &self.gate
    }

    /// Runs to completion
    ///
    /// Only an invalid request (or an unusable proxy) is an error; everything
    /// that happens once the run has started is reflected in the summary.
    pub async fn run(&self, request: RunRequest) -> Result<RunSummary, HoundError> {
        self.run_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Runs to completion, or until `cancel` fires
    pub async fn run_with_cancellation(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunSummary, HoundError> {
        request.validate(&self.config.crawler)?;

        let fetcher: Arc<dyn Fetcher> = match &self.fetcher {
            Some(fetcher) => Arc::clone(fetcher),
            None => Arc::new(HttpFetcher::new(
                &self.config.fetch,
                request.proxy.as_deref(),
            )?),
        };
        let keyword = request.keyword.trim().to_string();
        let seed = build_listing_url(&self.config.source.listing_url, &keyword)?;

        let crawler = &self.config.crawler;
        let state = Arc::new(RunState::new(request.target, crawler.max_crawl_limit));
        let frontier = Arc::new(Frontier::new(Arc::clone(&state)));
        let (tx, mut rx) = mpsc::unbounded_channel::<CrawledBook>();

        let mut phase = RunPhase::Idle;
        let run_id = self.record_run_start(&keyword, request.target);

        if state.is_unlimited() {
            tracing::info!(
                "Starting run for '{}' (unlimited, crawl limit {})",
                keyword,
                state.max_crawl_limit()
            );
        } else {
            tracing::info!(
                "Starting run for '{}' (target {} new books)",
                keyword,
                request.target
            );
        }

        // Idle -> Running
        phase = phase.transition(RunPhase::Running)?;
        frontier.push(WorkItem::listing(seed));

        let mut workers = JoinSet::new();
        Dispatcher::new(
            Arc::clone(&frontier),
            Arc::clone(&state),
            self.gate.clone(),
            fetcher,
            Arc::clone(&self.extractor),
            keyword.clone(),
            tx,
        )
        .spawn(request.concurrency as usize, &mut workers);

        let deadline = Instant::now() + Duration::from_secs(crawler.deadline_secs);

        tokio::select! {
            _ = join_workers(&mut workers) => {
                if state.stop(StopReason::FrontierExhausted) {
                    tracing::info!("Frontier exhausted; all workers idle");
                }
            }
            _ = state.stopped() => {}
            _ = tokio::time::sleep_until(deadline) => {
                if state.stop(StopReason::Deadline) {
                    tracing::warn!("Run deadline of {}s elapsed", crawler.deadline_secs);
                }
            }
            _ = cancel.cancelled() => {
                if state.stop(StopReason::Cancelled) {
                    tracing::warn!("Run cancelled");
                }
            }
        }

        // Running -> Draining
        phase = phase.transition(RunPhase::Draining)?;
        let grace = Duration::from_secs(crawler.grace_period_secs);
        if tokio::time::timeout(grace, join_workers(&mut workers))
            .await
            .is_err()
        {
            tracing::warn!(
                "{} workers still busy after {}s grace period; aborting them",
                workers.len(),
                crawler.grace_period_secs
            );
            // Workers only touch the gate between awaits, so an aborted
            // worker can never save after this point.
            workers.abort_all();
            join_workers(&mut workers).await;

            // Aborted workers never reach task_done
            let aborted = frontier.in_flight();
            state.record_skipped_many(aborted as u64);
            tracing::info!("Skipped {} in-flight pages after grace period", aborted);
        }

        let abandoned = frontier.drain_pending();
        state.record_skipped_many(abandoned as u64);
        if abandoned > 0 {
            tracing::info!("Skipped {} queued pages after stop", abandoned);
        }

        let mut books = Vec::new();
        while let Ok(crawled) = rx.try_recv() {
            books.push(crawled.record.book);
        }

        // Draining -> Finished
        phase = phase.transition(RunPhase::Finished)?;
        debug_assert!(phase.is_terminal());

        let counters = state.snapshot();
        let summary = RunSummary {
            keyword,
            books,
            total_crawled: counters.crawled,
            total_saved: counters.saved,
            total_duplicates: counters.duplicates,
            total_skipped: counters.skipped,
            total_failed: counters.failed,
            dedup_key: DEDUP_KEY_LABEL.to_string(),
            stop_reason: state.stop_reason(),
            started_at: state.started_at(),
            elapsed_ms: state.elapsed().as_millis() as u64,
            run_id,
        };

        self.record_run_finish(&summary);

        tracing::info!(
            "Run finished ({}): {} crawled, {} new, {} duplicates, {} skipped, {} failed",
            summary
                .stop_reason
                .map(|r| r.to_db_string())
                .unwrap_or("unknown"),
            summary.total_crawled,
            summary.total_saved,
            summary.total_duplicates,
            summary.total_skipped,
            summary.total_failed
        );

        Ok(summary)
    }

    fn record_run_start(&self, keyword: &str, target: u64) -> Option<i64> {
        let store = self.gate.store()?;
        let run = NewRun {
            keyword: keyword.to_string(),
            target,
            config_hash: self.config_hash.clone(),
        };
        match store.create_run(&run) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Could not record run start: {}", e);
                None
            }
        }
    }

    fn record_run_finish(&self, summary: &RunSummary) {
        let (Some(store), Some(run_id)) = (self.gate.store(), summary.run_id) else {
            return;
        };
        let outcome = RunOutcome {
            status: RunStatus::Completed,
            stop_reason: summary.stop_reason.map(|r| r.to_db_string().to_string()),
            crawled: summary.total_crawled,
            saved: summary.total_saved,
            duplicates: summary.total_duplicates,
            skipped: summary.total_skipped,
            failed: summary.total_failed,
        };
        if let Err(e) = store.finish_run(run_id, &outcome) {
            tracing::warn!("Could not record run {} result: {}", run_id, e);
        }
    }
}

async fn join_workers(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        match result {
            Err(e) if e.is_cancelled() => tracing::debug!("Worker aborted during drain"),
            Err(e) => tracing::error!("Worker task ended abnormally: {}", e),
            Ok(()) => {}
        }
    }
}
