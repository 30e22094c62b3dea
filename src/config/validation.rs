use crate::config::types::{Config, CrawlerConfig, OutputConfig, ProxyInput, SessionConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Called after the file is parsed and again after a JSON run input has
/// been applied on top of it.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_session_config(&config.sessions, &config.crawler)?;
    validate_proxy_input(&config.proxy)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let seed = Url::parse(&config.seed_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed-url: {}", e)))?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "seed-url '{}' must use HTTP or HTTPS",
            config.seed_url
        )));
    }

    if config.desired_concurrency < 1 || config.desired_concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "desired-concurrency must be between 1 and 64, got {}",
            config.desired_concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_pages_per_listing < 1 {
        return Err(ConfigError::Validation(
            "max-pages-per-listing must be >= 1".to_string(),
        ));
    }

    if config.max_request_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-request-retries must be <= 10, got {}",
            config.max_request_retries
        )));
    }

    Ok(())
}

/// Validates session pool limits against the crawler's concurrency
fn validate_session_config(
    config: &SessionConfig,
    crawler: &CrawlerConfig,
) -> Result<(), ConfigError> {
    if config.max_pool_size < crawler.desired_concurrency {
        return Err(ConfigError::Validation(format!(
            "max-pool-size ({}) must be >= desired-concurrency ({})",
            config.max_pool_size, crawler.desired_concurrency
        )));
    }

    if config.max_usage_count < 1 {
        return Err(ConfigError::Validation(
            "max-usage-count must be >= 1".to_string(),
        ));
    }

    if config.max_error_score < 1 {
        return Err(ConfigError::Validation(
            "max-error-score must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates explicit proxy URLs; Apify groups are checked when the proxy
/// configuration is built, since they depend on the environment
fn validate_proxy_input(proxy: &ProxyInput) -> Result<(), ConfigError> {
    for proxy_url in proxy.proxy_urls.iter().flatten() {
        let url = Url::parse(proxy_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy URL '{}': {}", proxy_url, e)))?;

        if !matches!(url.scheme(), "http" | "https" | "socks5") {
            return Err(ConfigError::Validation(format!(
                "Proxy URL '{}' has unsupported scheme '{}'",
                proxy_url,
                url.scheme()
            )));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.export_path.is_empty() {
        return Err(ConfigError::Validation(
            "export-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
