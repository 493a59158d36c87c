use crate::config::types::{Config, CrawlerConfig, FetchConfig, SourceConfig, StoreConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on workers per run
pub const MAX_CONCURRENCY: u32 = 32;

/// Upper bound on fetch retries
const MAX_RETRIES: u32 = 5;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetch_config(&config.fetch)?;
    validate_source_config(&config.source)?;
    validate_store_config(&config.store)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.concurrency
        )));
    }

    if config.deadline_secs < 1 {
        return Err(ConfigError::Validation(
            "deadline_secs must be >= 1".to_string(),
        ));
    }

    if config.max_crawl_limit < 1 {
        return Err(ConfigError::Validation(
            "max_crawl_limit must be >= 1".to_string(),
        ));
    }

    if config.default_target > config.max_target {
        return Err(ConfigError::Validation(format!(
            "default_target ({}) cannot exceed max_target ({})",
            config.default_target, config.max_target
        )));
    }

    Ok(())
}

/// Validates fetch configuration
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.retries > MAX_RETRIES {
        return Err(ConfigError::Validation(format!(
            "retries must be <= {}, got {}",
            MAX_RETRIES, config.retries
        )));
    }

    if let Some(proxy) = &config.proxy {
        validate_proxy(proxy)?;
    }

    Ok(())
}

/// Validates the listing URL template
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if !config.listing_url.contains("{keyword}") {
        return Err(ConfigError::Validation(format!(
            "listing_url must contain a {{keyword}} placeholder, got '{}'",
            config.listing_url
        )));
    }

    let probe = config.listing_url.replace("{keyword}", "probe");
    let url = Url::parse(&probe)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "listing_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    Ok(())
}

/// Validates store configuration
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.enabled && config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty when the store is enabled".to_string(),
        ));
    }
    Ok(())
}

/// Validates a proxy address (`scheme://host:port`)
pub(crate) fn validate_proxy(proxy: &str) -> Result<(), ConfigError> {
    let url = Url::parse(proxy)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Proxy '{}' has no host",
            proxy
        )));
    }

    Ok(())
}
