//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the BookStore trait.
//! The connection sits behind a `Mutex` so one store can be shared by every
//! worker; de-duplication itself relies on the `UNIQUE` constraint, so two
//! stores opened on the same file still never both insert one key.

use crate::record::BookRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BookStore, InsertOutcome, StorageError, StorageResult};
use crate::storage::{NewRun, RunOutcome, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const BOOK_COLUMNS: &str = "title, author, publisher, publish_date, original_price, \
     current_price, isbn, rating, comment_count, description, cover_image, detail_url, \
     search_keyword";

const RUN_COLUMNS: &str = "id, keyword, target, config_hash, status, stop_reason, started_at, \
     finished_at, total_crawled, total_saved, total_duplicates, total_skipped, total_failed";

/// SQLite book store
pub struct SqliteBookStore {
    conn: Mutex<Option<Connection>>,
}

impl SqliteBookStore {
    /// Opens (or creates) a book database
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteBookStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let guard = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(StorageError::Unavailable("store is closed".to_string())),
        }
    }

    fn query_books(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<BookRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let books = stmt
                .query_map(params, book_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(books)
        })
    }
}

impl BookStore for SqliteBookStore {
    // ===== Books =====

    fn try_insert(&self, dedup_key: &str, record: &BookRecord) -> StorageResult<InsertOutcome> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO books (dedup_key, {BOOK_COLUMNS}, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    dedup_key,
                    record.title,
                    record.author,
                    record.publisher,
                    record.publish_date,
                    record.original_price,
                    record.current_price,
                    record.isbn,
                    record.rating,
                    record.comment_count,
                    record.description,
                    record.cover_image,
                    record.detail_url,
                    record.search_keyword,
                    now,
                ],
            )?;

            Ok(if changed == 1 {
                InsertOutcome::Inserted
            } else {
                InsertOutcome::AlreadyPresent
            })
        })
    }

    fn count_books(&self) -> StorageResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }

    fn keyword_counts(&self) -> StorageResult<Vec<(String, u64)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT search_keyword, COUNT(*) AS n FROM books
                 WHERE search_keyword IS NOT NULL
                 GROUP BY search_keyword ORDER BY n DESC, search_keyword",
            )?;
            let counts = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(counts)
        })
    }

    fn books_by_keyword(&self, keyword: &str, limit: usize) -> StorageResult<Vec<BookRecord>> {
        self.query_books(
            &format!(
                "SELECT {BOOK_COLUMNS} FROM books WHERE search_keyword = ?1
                 ORDER BY id DESC LIMIT ?2"
            ),
            params![keyword, limit as i64],
        )
    }

    fn recent_books(&self, limit: usize) -> StorageResult<Vec<BookRecord>> {
        self.query_books(
            &format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id DESC LIMIT ?1"),
            params![limit as i64],
        )
    }

    // ===== Run History =====

    fn create_run(&self, run: &NewRun) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO runs (keyword, target, config_hash, status, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run.keyword,
                    run.target as i64,
                    run.config_hash,
                    RunStatus::Running.to_db_string(),
                    now
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn finish_run(&self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE runs SET status = ?1, stop_reason = ?2, finished_at = ?3,
                 total_crawled = ?4, total_saved = ?5, total_duplicates = ?6,
                 total_skipped = ?7, total_failed = ?8
                 WHERE id = ?9",
                params![
                    outcome.status.to_db_string(),
                    outcome.stop_reason,
                    now,
                    outcome.crawled as i64,
                    outcome.saved as i64,
                    outcome.duplicates as i64,
                    outcome.skipped as i64,
                    outcome.failed as i64,
                    run_id
                ],
            )?;

            if updated == 0 {
                return Err(StorageError::RunNotFound(run_id));
            }
            Ok(())
        })
    }

    fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.with_conn(|conn| {
            let run = conn
                .query_row(
                    &format!("SELECT {RUN_COLUMNS} FROM runs ORDER BY id DESC LIMIT 1"),
                    [],
                    run_from_row,
                )
                .optional()?;
            Ok(run)
        })
    }

    // ===== Lifecycle =====

    fn close(&self) -> StorageResult<()> {
        let mut guard = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| StorageError::Sqlite(e))?;
            tracing::debug!("Book store closed");
        }
        Ok(())
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<BookRecord> {
    Ok(BookRecord {
        title: row.get(0)?,
        author: row.get(1)?,
        publisher: row.get(2)?,
        publish_date: row.get(3)?,
        original_price: row.get(4)?,
        current_price: row.get(5)?,
        isbn: row.get(6)?,
        rating: row.get(7)?,
        comment_count: row.get(8)?,
        description: row.get(9)?,
        cover_image: row.get(10)?,
        detail_url: row.get(11)?,
        search_keyword: row.get(12)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        keyword: row.get(1)?,
        target: row.get::<_, i64>(2)? as u64,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        stop_reason: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        total_crawled: row.get::<_, i64>(8)? as u64,
        total_saved: row.get::<_, i64>(9)? as u64,
        total_duplicates: row.get::<_, i64>(10)? as u64,
        total_skipped: row.get::<_, i64>(11)? as u64,
        total_failed: row.get::<_, i64>(12)? as u64,
    })
}
