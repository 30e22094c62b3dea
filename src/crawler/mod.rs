//! Crawler module for directory traversal and extraction
//!
//! This module contains the core crawling logic, including:
//! - The request frontier with URL deduplication
//! - Per-session HTTP fetching through rotating proxies
//! - Label routing and the stage handlers
//! - Overall crawl supervision
//!
//! # Example
//!
//! ```no_run
//! use md_directory::config::load_config_with_hash;
//! use md_directory::crawler::Crawler;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
//! let crawler = Crawler::new(&config, &hash, false)?;
//! let report = crawler.run().await?;
//! println!("{} records", report.records);
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod document;
mod fetcher;
mod frontier;
pub mod handlers;
mod outcome;
mod proxy;
mod record;
mod router;
mod session;
mod task;

pub use coordinator::{CrawlReport, Crawler};
pub use document::{element_text, parse_selector, Document, LIST_ITEM_JOINER};
pub use fetcher::{build_http_client, fetch_page, FetchError, FetchedPage};
pub use frontier::{Frontier, InFlight};
pub use outcome::{ExtractionGap, HandlerOutput, Outcome};
pub use proxy::{redact_proxy_url, ProxyConfiguration};
pub use record::DetailRecord;
pub use router::Router;
pub use session::{PoolStats, Session, SessionLease, SessionPool};
pub use task::{Label, Task};
