//! Configuration module for forum-archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section except `[user-agent]` has defaults.
//!
//! # Example
//!
//! ```no_run
//! use forum_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Item delay: {:?}", config.crawler.item_delay());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    AopsConfig, ArchiveConfig, Config, CrawlerConfig, FeedConfig, StackExchangeConfig,
    StackExchangeSite, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
