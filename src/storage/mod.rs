//! Storage module for persisting books and run history
//!
//! This module handles all persistence for Bookhound, including:
//! - SQLite database initialization and schema management
//! - Insert-if-absent book storage keyed by the normalized dedup key
//! - Run tracking (start, final counters, stop reason)
//! - The `DedupGate` that turns store results into save verdicts

mod gate;
mod memory;
mod schema;
mod sqlite;
mod traits;

pub use gate::{DedupGate, SaveVerdict};
pub use memory::MemoryBookStore;
pub use sqlite::SqliteBookStore;
pub use traits::{BookStore, InsertOutcome, StorageError, StorageResult};

use crate::config::StoreConfig;
use std::path::Path;
use std::sync::Arc;

/// Opens the SQLite book store at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteBookStore)` - Successfully opened store
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> StorageResult<SqliteBookStore> {
    SqliteBookStore::new(path)
}

/// Builds the dedup gate for a run from the store settings
///
/// A disabled store yields an in-memory store. A store that fails to open
/// yields an unavailable gate: the run still proceeds, but every save fails.
pub fn open_gate(config: &StoreConfig) -> DedupGate {
    if !config.enabled {
        tracing::info!("Persistence disabled; de-duplicating in memory only");
        return DedupGate::new(Arc::new(MemoryBookStore::new()));
    }

    match open_storage(Path::new(&config.database_path)) {
        Ok(store) => DedupGate::new(Arc::new(store)),
        Err(e) => {
            tracing::warn!(
                "Book store {} unavailable, saves will fail: {}",
                config.database_path,
                e
            );
            DedupGate::unavailable()
        }
    }
}

/// Parameters recorded when a run starts
#[derive(Debug, Clone)]
pub struct NewRun {
    pub keyword: String,
    pub target: u64,
    pub config_hash: String,
}

/// Final state recorded when a run finishes
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub stop_reason: Option<String>,
    pub crawled: u64,
    pub saved: u64,
    pub duplicates: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Represents an orchestration run in the store
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub keyword: String,
    pub target: u64,
    pub config_hash: String,
    pub status: RunStatus,
    pub stop_reason: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub total_crawled: u64,
    pub total_saved: u64,
    pub total_duplicates: u64,
    pub total_skipped: u64,
    pub total_failed: u64,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
