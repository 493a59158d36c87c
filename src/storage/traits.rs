//! Storage traits and error types
//!
//! This module defines the trait interface for book stores and the
//! associated error types.

use crate::record::BookRecord;
use crate::storage::{NewRun, RunOutcome, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Run not found: {0}")]
    RunNotFound(i64),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result of one insert-if-absent attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was new and the record is now stored
    Inserted,

    /// A record with the same key already existed; nothing was written
    AlreadyPresent,
}

/// Trait for book store implementations
///
/// Implementations must be safe to share between workers. `try_insert` in
/// particular must decide "new or existing" in a single atomic store
/// operation, never as a read followed by a write.
pub trait BookStore: Send + Sync {
    // ===== Books =====

    /// Inserts a record unless one with the same dedup key exists
    ///
    /// # Arguments
    ///
    /// * `dedup_key` - The normalized title + author key
    /// * `record` - The fields to persist
    ///
    /// # Returns
    ///
    /// Whether the record was inserted or was already present
    fn try_insert(&self, dedup_key: &str, record: &BookRecord) -> StorageResult<InsertOutcome>;

    /// Gets the total number of stored books
    fn count_books(&self) -> StorageResult<u64>;

    /// Gets stored book counts per search keyword, largest first
    fn keyword_counts(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Gets books stored for a keyword, newest first
    fn books_by_keyword(&self, keyword: &str, limit: usize) -> StorageResult<Vec<BookRecord>>;

    /// Gets the most recently stored books
    fn recent_books(&self, limit: usize) -> StorageResult<Vec<BookRecord>>;

    // ===== Run History =====

    /// Records the start of a run and returns its ID
    fn create_run(&self, run: &NewRun) -> StorageResult<i64>;

    /// Records the final status and counters of a run
    fn finish_run(&self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()>;

    /// Gets the most recent run
    fn latest_run(&self) -> StorageResult<Option<RunRecord>>;

    // ===== Lifecycle =====

    /// Releases the underlying connection; later calls fail as unavailable
    fn close(&self) -> StorageResult<()>;
}
