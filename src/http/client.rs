//! HTTP client used by every scraper
//!
//! A GET goes through four gates, in order:
//! - the per-domain rate limiter
//! - a global concurrency permit
//! - the retry policy (transient failures are retried with backoff)
//! - a randomized politeness delay after a successful response

use crate::config::Settings;
use crate::http::{DelayManager, Fetch, FetchError, RateLimiter, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

/// Builds the underlying reqwest client
///
/// # Arguments
///
/// * `user_agent` - Static user agent string sent with every request
/// * `timeout` - Total per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited, retrying HTTP client
pub struct HttpClient {
    client: Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    delays: DelayManager,
    permits: Arc<Semaphore>,
}

impl HttpClient {
    /// Creates a client from runtime settings
    ///
    /// # Arguments
    ///
    /// * `settings` - Timeout, retry, delay and concurrency settings
    /// * `rate_limit_rpm` - Requests per minute allowed per domain
    pub fn new(settings: &Settings, rate_limit_rpm: u32) -> Result<Self, FetchError> {
        let client = build_http_client(&settings.user_agent, settings.request_timeout())
            .map_err(|e| FetchError::Client(e.to_string()))?;
        let (min, max) = settings.delay_range();

        Ok(Self::with_parts(
            client,
            Arc::new(RateLimiter::new(rate_limit_rpm)),
            RetryPolicy::new(settings.max_retries),
            DelayManager::new(min, max),
            settings.max_concurrent,
        ))
    }

    /// Assembles a client from individual components
    pub fn with_parts(
        client: Client,
        limiter: Arc<RateLimiter>,
        retry: RetryPolicy,
        delays: DelayManager,
        max_concurrent: usize,
    ) -> Self {
        Self {
            client,
            limiter,
            retry,
            delays,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// One GET without retries, classified into a [`FetchError`] on failure
    async fn get_once(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Fetch for HttpClient {
    async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        let domain = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;

        let body = self
            .retry
            .execute(url.as_str(), |attempt| async move {
                self.limiter.acquire(domain).await;
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Client("request pool closed".to_string()))?;

                tracing::debug!("GET {} (attempt {})", url, attempt + 1);
                let result = self.get_once(url).await;

                if let Err(e) = &result {
                    if e.is_throttle() {
                        self.limiter.record_throttled(domain);
                    }
                }
                result
            })
            .await?;

        self.delays.wait().await;
        Ok(body)
    }
}

fn classify_error(url: &Url, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else {
        FetchError::Request {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
