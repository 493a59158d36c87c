//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with browser-like headers and an optional proxy
//! - GET requests to fetch page content
//! - Retry logic for transient failures
//! - Error classification
//!
//! The crawler only sees the `Fetcher` trait, so tests can swap in canned
//! pages without a network.

use crate::config::FetchConfig;
use crate::HoundError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Proxy};
use std::time::Duration;
use thiserror::Error;
use url::Url;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Page body content
    pub body: String,
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
}

/// Errors from the fetch primitive
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Other(String),
}

impl FetchError {
    /// Timeouts, connection failures and 5xx responses are worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Body(_) | Self::Other(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// Fetch primitive used by crawl tasks
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
/// * `proxy` - Proxy URL for this run; overrides `config.proxy` when set
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HoundError)` - Invalid proxy or client build failure
pub fn build_http_client(config: &FetchConfig, proxy: Option<&str>) -> Result<Client, HoundError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language)
            .map_err(|e| HoundError::InvalidRequest(format!("accept-language: {e}")))?,
    );

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy.or(config.proxy.as_deref()) {
        tracing::info!("Using proxy {}", proxy);
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

/// reqwest-backed fetcher with a fixed retry budget
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Return body |
/// | HTTP 4xx | Fail immediately |
/// | HTTP 5xx | Retry up to `retries` times |
/// | Timeout / connect error | Retry up to `retries` times |
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig, proxy: Option<&str>) -> Result<Self, HoundError> {
        Ok(Self {
            client: build_http_client(config, proxy)?,
            retries: config.retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FetchError::Status {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(FetchedPage {
            body,
            final_url,
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Retrying {} ({}/{}) after: {}",
                        url,
                        attempt,
                        self.retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
