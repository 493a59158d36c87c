//! Statistics from the book store
//!
//! Totals, per-keyword counts, and the most recent run.

use crate::storage::{BookStore, RunRecord, StorageResult};
use std::fmt::Write;

/// Store statistics summary
#[derive(Debug, Clone)]
pub struct StoreStatistics {
    /// Total number of stored books
    pub total_books: u64,

    /// Stored books per search keyword, largest first
    pub keyword_counts: Vec<(String, u64)>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from a store
///
/// # Arguments
///
/// * `store` - The book store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query the store
pub fn load_statistics(store: &dyn BookStore) -> StorageResult<StoreStatistics> {
    Ok(StoreStatistics {
        total_books: store.count_books()?,
        keyword_counts: store.keyword_counts()?,
        latest_run: store.latest_run()?,
    })
}

pub fn format_statistics(stats: &StoreStatistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Store Statistics ===\n");
    let _ = writeln!(out, "Total books: {}", stats.total_books);

    if !stats.keyword_counts.is_empty() {
        let _ = writeln!(out, "\nBooks by keyword:");
        for (keyword, count) in &stats.keyword_counts {
            let percentage = if stats.total_books > 0 {
                (*count as f64 / stats.total_books as f64) * 100.0
            } else {
                0.0
            };
            let _ = writeln!(out, "  {}: {} ({:.1}%)", keyword, count, percentage);
        }
    }

    if let Some(run) = &stats.latest_run {
        let _ = writeln!(out, "\nLatest run (#{}):", run.id);
        let _ = writeln!(out, "  Keyword: {} (target {})", run.keyword, run.target);
        let _ = writeln!(out, "  Status: {}", run.status.to_db_string());
        if let Some(reason) = &run.stop_reason {
            let _ = writeln!(out, "  Stop reason: {}", reason);
        }
        let _ = writeln!(out, "  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            let _ = writeln!(out, "  Finished: {}", finished);
        }
        let _ = writeln!(
            out,
            "  Crawled {}, new {}, duplicates {}, skipped {}, failed {}",
            run.total_crawled,
            run.total_saved,
            run.total_duplicates,
            run.total_skipped,
            run.total_failed
        );
    }

    out
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &StoreStatistics) {
    print!("{}", format_statistics(stats));
}
