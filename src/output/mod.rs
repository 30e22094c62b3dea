//! Output module for crawl reports and record export
//!
//! This module handles:
//! - Loading and printing crawl statistics
//! - Exporting stored records as JSON Lines

mod export;
pub mod stats;

pub use export::export_records;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
