use serde::Deserialize;

/// Entry point of the directory listing
pub const DEFAULT_SEED_URL: &str = "https://www.doximity.com/directory/md";

/// Main configuration structure for md-directory
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    pub input: RunConfig,
    #[serde(default)]
    pub proxy: ProxyInput,
    pub output: OutputConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Top-level directory listing the crawl starts from
    #[serde(rename = "seed-url", default = "default_seed_url")]
    pub seed_url: String,

    /// Number of tasks processed at the same time
    #[serde(rename = "desired-concurrency", default = "default_concurrency")]
    pub desired_concurrency: u32,

    /// Per-request fetch timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum number of pages followed in one pagination chain
    #[serde(rename = "max-pages-per-listing", default = "default_max_pages")]
    pub max_pages_per_listing: u32,

    /// Extra fetch attempts after a transport failure
    #[serde(rename = "max-request-retries", default)]
    pub max_request_retries: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_url: default_seed_url(),
            desired_concurrency: default_concurrency(),
            request_timeout_secs: default_timeout(),
            max_pages_per_listing: default_max_pages(),
            max_request_retries: 0,
        }
    }
}

/// Session pool limits
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of live sessions
    #[serde(rename = "max-pool-size", default = "default_pool_size")]
    pub max_pool_size: u32,

    /// Requests a session may serve before it is retired
    #[serde(rename = "max-usage-count", default = "default_usage_count")]
    pub max_usage_count: u32,

    /// Failures a session may accumulate before it is retired
    #[serde(rename = "max-error-score", default = "default_error_score")]
    pub max_error_score: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_pool_size: default_pool_size(),
            max_usage_count: default_usage_count(),
            max_error_score: default_error_score(),
        }
    }
}

/// The run input consumed by the top-level handler
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    /// Visible name of the region to crawl (e.g. "Texas")
    #[serde(rename = "target-region", default)]
    pub target_region: String,
}

/// Proxy settings, mirroring the actor input schema
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ProxyInput {
    #[serde(rename = "use-apify-proxy", alias = "useApifyProxy", default)]
    pub use_apify_proxy: bool,

    #[serde(rename = "proxy-urls", alias = "proxyUrls", default)]
    pub proxy_urls: Option<Vec<String>>,

    #[serde(rename = "apify-proxy-groups", alias = "apifyProxyGroups", default)]
    pub apify_proxy_groups: Option<Vec<String>>,

    #[serde(rename = "apify-proxy-country", alias = "apifyProxyCountry", default)]
    pub apify_proxy_country: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path of the JSON Lines export written by `--export`
    #[serde(rename = "export-path", default = "default_export_path")]
    pub export_path: String,
}

/// Actor-style JSON input (`--input`), overriding `[input]` and `[proxy]`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunInput {
    #[serde(rename = "targetRegion", alias = "state", default)]
    pub target_region: Option<String>,

    #[serde(default)]
    pub proxy: Option<ProxyInput>,
}

impl RunInput {
    /// Applies the input on top of a file configuration
    pub fn apply(self, config: &mut Config) {
        if let Some(region) = self.target_region {
            config.input.target_region = region;
        }
        if let Some(proxy) = self.proxy {
            config.proxy = proxy;
        }
    }
}

fn default_seed_url() -> String {
    DEFAULT_SEED_URL.to_string()
}

fn default_concurrency() -> u32 {
    2
}

fn default_timeout() -> u64 {
    10
}

fn default_max_pages() -> u32 {
    500
}

fn default_pool_size() -> u32 {
    40
}

fn default_usage_count() -> u32 {
    50
}

fn default_error_score() -> u32 {
    3
}

fn default_export_path() -> String {
    "./records.jsonl".to_string()
}
