//! Worker pool
//!
//! Runs up to N fetch/extract tasks at once, all pulling from the shared
//! frontier. Workers apply task outcomes to the run state and the dedup gate
//! themselves; the only thing that leaves a worker is the stream of crawled
//! records sent to the supervisor.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Frontier, PageKind, WorkItem};
use crate::crawler::task::{run_task, TaskOutcome};
use crate::extract::{Extractor, ListingEntry};
use crate::record::{BookRecord, ExtractedRecord};
use crate::state::RunState;
use crate::storage::{DedupGate, SaveVerdict};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;
use url::Url;

/// A record that reached the dedup gate, with the gate's verdict
#[derive(Debug, Clone)]
pub struct CrawledBook {
    pub record: ExtractedRecord,
    pub verdict: SaveVerdict,
}

/// Everything a worker needs, shared by all workers of one run
pub struct Dispatcher {
    frontier: Arc<Frontier>,
    state: Arc<RunState>,
    gate: DedupGate,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    keyword: String,
    records: UnboundedSender<CrawledBook>,
}

impl Dispatcher {
    pub fn new(
        frontier: Arc<Frontier>,
        state: Arc<RunState>,
        gate: DedupGate,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        keyword: String,
        records: UnboundedSender<CrawledBook>,
    ) -> Self {
        Self {
            frontier,
            state,
            gate,
            fetcher,
            extractor,
            keyword,
            records,
        }
    }

    /// Spawns `concurrency` workers into `workers`
    pub fn spawn(self, concurrency: usize, workers: &mut JoinSet<()>) {
        let shared = Arc::new(self);
        for id in 0..concurrency.max(1) {
            let shared = Arc::clone(&shared);
            workers.spawn(async move { shared.worker_loop(id).await });
        }
    }

    async fn worker_loop(&self, id: usize) {
        tracing::debug!("Worker {} started", id);

        loop {
            if !self.state.should_accept_more_work() {
                self.state.check_and_maybe_stop();
                break;
            }

            let Some(item) = self.frontier.next().await else {
                break;
            };

            self.process(item).await;
            self.frontier.task_done();
        }

        tracing::debug!("Worker {} exiting", id);
    }

    async fn process(&self, item: WorkItem) {
        if self.state.is_stopped() {
            self.state.record_skipped_since_stopped();
            return;
        }

        if item.kind == PageKind::Detail && !self.state.try_begin_detail() {
            tracing::debug!("Crawl limit reached; skipping {}", item.url);
            self.state.record_skipped_since_stopped();
            self.state.check_and_maybe_stop();
            return;
        }

        tracing::debug!("Processing {:?} {}", item.kind, item.url);
        let outcome = run_task(
            &item,
            self.fetcher.as_ref(),
            self.extractor.as_ref(),
            &self.keyword,
        )
        .await;
        self.apply(outcome);
    }

    /// Applies one task outcome to the frontier, run state, and gate
    fn apply(&self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Listing {
                entries,
                next_page_url,
            } => self.apply_listing(entries, next_page_url),

            TaskOutcome::Detail {
                record: Some(record),
            } => self.apply_record(record),

            TaskOutcome::Detail { record: None } => {
                self.state.record_crawled();
                self.state.record_failed();
                self.state.check_and_maybe_stop();
            }

            TaskOutcome::Failure { reason } => {
                tracing::warn!("Task failed: {}", reason);
                self.state.record_failed();
            }
        }
    }

    fn apply_listing(&self, entries: Vec<ListingEntry>, next_page_url: Option<String>) {
        let found = entries.len();
        let mut queued = 0;

        for entry in entries {
            let Ok(url) = Url::parse(&entry.detail_url) else {
                continue;
            };
            if self.frontier.push(WorkItem::detail(url, entry.context())) {
                queued += 1;
            }
        }

        let mut next_queued = false;
        if let Some(next) = next_page_url {
            if self.state.should_accept_more_work() {
                match Url::parse(&next) {
                    Ok(url) => next_queued = self.frontier.push(WorkItem::listing(url)),
                    Err(e) => tracing::warn!("Ignoring bad next-page link {}: {}", next, e),
                }
            }
        } else {
            tracing::info!("Reached the last listing page");
        }

        tracing::info!(
            "Listing page: {} detail links, {} queued, next page queued: {}",
            found,
            queued,
            next_queued
        );
    }

    fn apply_record(&self, record: ExtractedRecord) {
        self.state.record_crawled();

        let verdict = self.gate.try_save(&record.book);
        match &verdict {
            SaveVerdict::Saved => {
                self.state.record_saved();
                let counters = self.state.snapshot();
                tracing::info!(
                    "Saved '{}' (new: {}, crawled: {})",
                    record.book.title.as_deref().unwrap_or_default(),
                    counters.saved,
                    counters.crawled
                );
                tracing::debug!(
                    "{} of {} fields populated from {}",
                    record.book.field_count(),
                    BookRecord::FIELD_COUNT,
                    record.source_url
                );
            }
            SaveVerdict::Duplicate => {
                self.state.record_duplicate();
                tracing::info!(
                    "Duplicate '{}' skipped",
                    record.book.title.as_deref().unwrap_or_default()
                );
            }
            SaveVerdict::Failed(reason) => {
                tracing::warn!("Save failed for {}: {}", record.source_url, reason);
            }
        }

        if self.state.check_and_maybe_stop() {
            let counters = self.state.snapshot();
            tracing::info!(
                "Stop condition reached: {} new, {} crawled, {} duplicates",
                counters.saved,
                counters.crawled,
                counters.duplicates
            );
        }

        if self.records.send(CrawledBook { record, verdict }).is_err() {
            tracing::debug!("Record receiver dropped; result not collected");
        }
    }
}
