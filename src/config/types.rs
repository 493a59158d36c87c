use serde::Deserialize;

/// Main configuration structure for Bookhound
///
/// Every section is optional; a missing section falls back to its defaults,
/// so `Config::default()` is itself a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
}

/// Orchestration limits for a single run
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent fetch/extract workers
    pub concurrency: u32,

    /// Wall-clock budget for one run (seconds)
    pub deadline_secs: u64,

    /// How long draining waits for in-flight workers (seconds)
    pub grace_period_secs: u64,

    /// Hard ceiling on detail-page fetches per run, applied even in unlimited mode
    pub max_crawl_limit: u64,

    /// Largest target a caller may request
    pub max_target: u64,

    /// Target used when the caller does not supply one
    pub default_target: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            deadline_secs: 90,
            grace_period_secs: 5,
            max_crawl_limit: 1000,
            max_target: 500,
            default_target: 20,
        }
    }
}

/// HTTP fetch settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Accept-Language header sent with every request
    pub accept_language: String,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Retries for timeouts and 5xx responses
    pub retries: u32,

    /// Delay between retries (milliseconds)
    pub retry_delay_ms: u64,

    /// Default proxy; a run request may override it
    pub proxy: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "zh-CN,zh;q=0.9,en;q=0.8".to_string(),
            timeout_secs: 30,
            retries: 2,
            retry_delay_ms: 500,
            proxy: None,
        }
    }
}

/// Where the listing chain starts
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Search URL template; `{keyword}` is replaced by the encoded keyword
    pub listing_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://search.dangdang.com/?key={keyword}&act=input".to_string(),
        }
    }
}

/// Persistent store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StoreConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// When false, runs deduplicate in memory only
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "./bookhound.db".to_string(),
            enabled: true,
        }
    }
}
