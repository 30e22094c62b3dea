//! URL handling module for md-directory
//!
//! Normalization gives every crawl task its identity; resolution turns
//! anchor hrefs found on a page into absolute, fetchable URLs.

mod normalize;
mod resolve;

pub use normalize::normalize_url;
pub use resolve::{resolve_link, same_host};
