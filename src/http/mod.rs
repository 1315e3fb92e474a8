//! HTTP fetching for scrapers
//!
//! This module handles every request a scraper makes, including:
//! - Building the reqwest client with a static user agent
//! - Per-domain rate limiting with adaptive slow-down
//! - Retries with capped exponential backoff
//! - Randomized delays between requests
//! - Error classification (retryable vs. permanent)

mod client;
mod delay;
mod domain_state;
mod rate_limiter;
mod retry;

pub use client::{build_http_client, HttpClient};
pub use delay::DelayManager;
pub use domain_state::{DomainState, DomainStats};
pub use rate_limiter::{RateLimiter, DEFAULT_MIN_RPM};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// HTTP statuses worth retrying
pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Errors produced while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Gave up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt might succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => RETRYABLE_STATUSES.contains(status),
            Self::Timeout { .. } | Self::Connect { .. } | Self::Request { .. } => true,
            Self::Body { .. }
            | Self::InvalidUrl(_)
            | Self::Client(_)
            | Self::RetriesExhausted { .. } => false,
        }
    }

    /// Whether the server asked us to slow down
    pub fn is_throttle(&self) -> bool {
        matches!(self.status(), Some(429) | Some(503))
    }

    /// The HTTP status behind this error, looking through retries
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Source of page bodies
///
/// [`HttpClient`] is the production implementation. Sources that need a
/// rendered DOM plug in an external browser renderer behind the same trait.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `url` and returns the response body as text
    async fn get_text(&self, url: &Url) -> Result<String, FetchError>;
}
