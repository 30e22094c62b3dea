//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler:
//! - Building per-session HTTP clients (proxy, cookie jar, browser identity)
//! - GET requests with a per-request timeout
//! - Error classification into transport failures

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Browser identity presented to the site (Chrome 124 on Windows)
const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Status codes that mean the session has been blocked
const BLOCKED_STATUS_CODES: &[u16] = &[401, 403, 429];

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Page body content
    pub body: String,
}

/// Transport-level failure for one request
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timeout for {url}")]
    Timeout { url: String },

    #[error("connection failed for {url}: {message}")]
    Connect { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to read body of {url} (HTTP {status}): {message}")]
    Body {
        url: String,
        status: u16,
        message: String,
    },

    #[error("request failed for {url}: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::Body { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body, when one was received
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns true if another attempt may succeed
    ///
    /// Timeouts, connection failures, cut-off bodies and server errors are
    /// transient. Blocked statuses count too, since the next attempt runs on
    /// a different session.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connect { .. } | Self::Body { .. } => true,
            Self::Status { status, .. } => {
                *status >= 500 || BLOCKED_STATUS_CODES.contains(status)
            }
            Self::Request { .. } => false,
        }
    }

    /// Returns true if the response indicates the session was blocked
    pub fn is_blocked(&self) -> bool {
        self.status()
            .is_some_and(|status| BLOCKED_STATUS_CODES.contains(&status))
    }

    fn from_reqwest(url: &Url, error: reqwest::Error) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            Self::Timeout { url }
        } else if error.is_connect() {
            Self::Connect {
                url,
                message: error.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: error.to_string(),
            }
        }
    }
}

/// Builds the HTTP client backing one session
///
/// # Arguments
///
/// * `timeout` - Per-request timeout
/// * `proxy_url` - Egress proxy for this session, if any
/// * `cookies` - The session's cookie jar
pub fn build_http_client(
    timeout: Duration,
    proxy_url: Option<&str>,
    cookies: Arc<Jar>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .default_headers(browser_headers())
        .cookie_provider(cookies)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true);

    // Egress is decided by the proxy configuration only, never by env vars
    builder = match proxy_url {
        Some(proxy_url) => builder.proxy(Proxy::all(proxy_url)?),
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Headers a desktop Chrome sends on a top-level navigation
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CHROME_USER_AGENT));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(
        "sec-ch-ua",
        HeaderValue::from_static(
            "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\"",
        ),
    );
    headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
    headers.insert("upgrade-insecure-requests", HeaderValue::from_static("1"));
    headers
}

/// Fetches a page
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with readable body | `Ok(FetchedPage)` |
/// | non-2xx | `FetchError::Status` (body kept for diagnosis) |
/// | timeout | `FetchError::Timeout` |
/// | connection refused / TLS | `FetchError::Connect` |
/// | unreadable body | `FetchError::Body` |
pub async fn fetch_page(client: &Client, url: &Url) -> Result<FetchedPage, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;

    let status = response.status();
    let final_url = response.url().clone();

    let body = response.text().await.map_err(|e| FetchError::Body {
        url: url.to_string(),
        status: status.as_u16(),
        message: e.to_string(),
    })?;

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(FetchedPage {
        final_url,
        status: status.as_u16(),
        body,
    })
}
