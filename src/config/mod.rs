//! Configuration module for Bookhound
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use bookhound::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("bookhound.toml")).unwrap();
//! println!("Workers per run: {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, FetchConfig, SourceConfig, StoreConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::{validate, MAX_CONCURRENCY};
pub(crate) use validation::validate_proxy;
