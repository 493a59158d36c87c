//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Bookhound database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track orchestration runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    keyword TEXT NOT NULL,
    target INTEGER NOT NULL,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    stop_reason TEXT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    total_crawled INTEGER NOT NULL DEFAULT 0,
    total_saved INTEGER NOT NULL DEFAULT 0,
    total_duplicates INTEGER NOT NULL DEFAULT 0,
    total_skipped INTEGER NOT NULL DEFAULT 0,
    total_failed INTEGER NOT NULL DEFAULT 0
);

-- Stored books; dedup_key is the uniqueness constraint behind insert-if-absent
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    dedup_key TEXT NOT NULL UNIQUE,
    title TEXT,
    author TEXT,
    publisher TEXT,
    publish_date TEXT,
    original_price TEXT,
    current_price TEXT,
    isbn TEXT,
    rating TEXT,
    comment_count TEXT,
    description TEXT,
    cover_image TEXT,
    detail_url TEXT,
    search_keyword TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_books_keyword ON books(search_keyword);
CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
