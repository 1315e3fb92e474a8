//! Review-Harvest: a polite multi-site review scraper
//!
//! This crate collects customer and product reviews from third-party sites,
//! respecting per-domain rate limits, retrying transient failures, and
//! checkpointing progress so an interrupted scrape can resume. Reviews are
//! normalized into a flat `{id, text}` training format on export.

pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod http;
pub mod output;
pub mod pipeline;
pub mod review;
pub mod sources;

use thiserror::Error;

/// Main error type for Review-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] http::FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] sources::ParseError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Unknown source '{0}' (run `sources` to list the available ones)")]
    UnknownSource(String),

    #[error("Invalid target '{input}' for {site}: {reason}")]
    InvalidTarget {
        site: String,
        input: String,
        reason: String,
    },

    #[error("No targets to scrape for source '{0}'")]
    NoTargets(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Review-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Settings, SourcesConfig};
pub use review::{RawReview, Review, ReviewFactory};
pub use sources::{build_scraper, Scraper, SourceKind};
