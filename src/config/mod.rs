//! Configuration module for md-directory
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file and the optional actor-style JSON run input.
//!
//! # Example
//!
//! ```no_run
//! use md_directory::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Crawling region: {}", config.input.target_region);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, ProxyInput, RunConfig, RunInput, SessionConfig,
    DEFAULT_SEED_URL,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, load_run_input};
pub use validation::validate;
