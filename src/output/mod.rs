//! Output module for run summaries and stored-book listings
//!
//! This module handles:
//! - Formatting run summaries for the terminal
//! - Serializing summaries as JSON for the web front-end
//! - Listing stored books and store statistics

pub mod stats;

pub use stats::{format_statistics, load_statistics, print_statistics, StoreStatistics};

use crate::crawler::RunSummary;
use crate::record::BookRecord;
use std::fmt::Write;

/// Formats a run summary as a human-readable report
///
/// # Arguments
///
/// * `summary` - The finished run's summary
///
/// # Returns
///
/// A multi-line report; books are listed with title, author and price
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Run Summary: {} ===\n", summary.keyword);
    if let Some(run_id) = summary.run_id {
        let _ = writeln!(out, "Run ID: {}", run_id);
    }
    let _ = writeln!(
        out,
        "Stop reason: {}",
        summary
            .stop_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    let _ = writeln!(
        out,
        "Started: {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "Elapsed: {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    let _ = writeln!(out, "Dedup key: {}\n", summary.dedup_key);

    let _ = writeln!(out, "Crawled:    {}", summary.total_crawled);
    let _ = writeln!(out, "New:        {}", summary.total_saved);
    let _ = writeln!(out, "Duplicates: {}", summary.total_duplicates);
    let _ = writeln!(out, "Skipped:    {}", summary.total_skipped);
    let _ = writeln!(out, "Failed:     {}", summary.total_failed);

    if !summary.books.is_empty() {
        let _ = writeln!(out, "\nBooks:");
        out.push_str(&format_books(&summary.books));
    }

    out
}

/// Prints a run summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}

/// Serializes a run summary as pretty-printed JSON
pub fn summary_to_json(summary: &RunSummary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}

/// Formats books one per line, numbered
pub fn format_books(books: &[BookRecord]) -> String {
    let mut out = String::new();
    for (i, book) in books.iter().enumerate() {
        let _ = write!(
            out,
            "  {:>3}. {}",
            i + 1,
            book.title.as_deref().unwrap_or("(untitled)")
        );
        if let Some(author) = &book.author {
            let _ = write!(out, " / {}", author);
        }
        if let Some(price) = &book.current_price {
            let _ = write!(out, " [{}]", price);
        }
        out.push('\n');
    }
    out
}
