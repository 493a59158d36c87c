//! In-process book store
//!
//! Used when persistence is disabled: de-duplication then only spans the
//! current process.

use crate::record::BookRecord;
use crate::storage::traits::{BookStore, InsertOutcome, StorageError, StorageResult};
use crate::storage::{NewRun, RunOutcome, RunRecord, RunStatus};
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    keys: HashSet<String>,
    books: Vec<BookRecord>,
    runs: Vec<RunRecord>,
    closed: bool,
}

/// Book store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBookStore {
    inner: Mutex<Inner>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> StorageResult<T>) -> StorageResult<T> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        if inner.closed {
            return Err(StorageError::Unavailable("store is closed".to_string()));
        }
        f(&mut inner)
    }
}

impl BookStore for MemoryBookStore {
    fn try_insert(&self, dedup_key: &str, record: &BookRecord) -> StorageResult<InsertOutcome> {
        self.with_inner(|inner| {
            if inner.keys.insert(dedup_key.to_string()) {
                inner.books.push(record.clone());
                Ok(InsertOutcome::Inserted)
            } else {
                Ok(InsertOutcome::AlreadyPresent)
            }
        })
    }

    fn count_books(&self) -> StorageResult<u64> {
        self.with_inner(|inner| Ok(inner.books.len() as u64))
    }

    fn keyword_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        self.with_inner(|inner| {
            let mut counts: BTreeMap<String, u64> = BTreeMap::new();
            for keyword in inner.books.iter().filter_map(|b| b.search_keyword.as_ref()) {
                *counts.entry(keyword.clone()).or_default() += 1;
            }
            let mut counts: Vec<_> = counts.into_iter().collect();
            counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            Ok(counts)
        })
    }

    fn books_by_keyword(&self, keyword: &str, limit: usize) -> StorageResult<Vec<BookRecord>> {
        self.with_inner(|inner| {
            Ok(inner
                .books
                .iter()
                .rev()
                .filter(|b| b.search_keyword.as_deref() == Some(keyword))
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn recent_books(&self, limit: usize) -> StorageResult<Vec<BookRecord>> {
        self.with_inner(|inner| Ok(inner.books.iter().rev().take(limit).cloned().collect()))
    }

    fn create_run(&self, run: &NewRun) -> StorageResult<i64> {
        self.with_inner(|inner| {
            let id = inner.runs.len() as i64 + 1;
            inner.runs.push(RunRecord {
                id,
                keyword: run.keyword.clone(),
                target: run.target,
                config_hash: run.config_hash.clone(),
                status: RunStatus::Running,
                stop_reason: None,
                started_at: Utc::now().to_rfc3339(),
                finished_at: None,
                total_crawled: 0,
                total_saved: 0,
                total_duplicates: 0,
                total_skipped: 0,
                total_failed: 0,
            });
            Ok(id)
        })
    }

    fn finish_run(&self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()> {
        self.with_inner(|inner| {
            let run = inner
                .runs
                .iter_mut()
                .find(|r| r.id == run_id)
                .ok_or(StorageError::RunNotFound(run_id))?;

            run.status = outcome.status;
            run.stop_reason = outcome.stop_reason.clone();
            run.finished_at = Some(Utc::now().to_rfc3339());
            run.total_crawled = outcome.crawled;
            run.total_saved = outcome.saved;
            run.total_duplicates = outcome.duplicates;
            run.total_skipped = outcome.skipped;
            run.total_failed = outcome.failed;
            Ok(())
        })
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.with_inner(|inner| Ok(inner.runs.last().cloned()))
    }

    fn close(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock().map_err(|_| StorageError::Poisoned)?;
        inner.closed = true;
        Ok(())
    }
}
