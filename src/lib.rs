//! Bookhound: a quota-bounded book listing crawler
//!
//! This crate searches a paginated book listing for a keyword, fans detail
//! pages out to a bounded pool of workers, and persists each book through an
//! insert-if-absent store until a caller-supplied quota of *new* books is met,
//! the listing runs out, or the run deadline expires.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Bookhound operations
#[derive(Debug, Error)]
pub enum HoundError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("Invalid run phase transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunPhase,
        to: state::RunPhase,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Listing template has no {{keyword}} placeholder: {0}")]
    MissingPlaceholder(String),
}

/// Result type alias for Bookhound operations
pub type Result<T> = std::result::Result<T, HoundError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{RunRequest, RunSummary, Supervisor};
pub use record::{BookRecord, ExtractedRecord};
pub use state::{RunPhase, RunState, StopReason};
pub use storage::{BookStore, DedupGate, SaveVerdict};
