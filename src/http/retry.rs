//! Bounded retries with capped exponential backoff

use crate::http::FetchError;
use std::future::Future;
use std::time::Duration;

/// Retry schedule for transient fetch failures
///
/// Attempt `n` (zero-based) that fails with a retryable error waits
/// `base_delay * multiplier^n`, capped at `max_delay`, with a random
/// `±jitter` fraction applied. At most `max_retries + 1` attempts are made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Total number of attempts, including the first
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retrying after failed attempt `attempt`, without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Backoff for `attempt` with random jitter applied, still capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        if self.jitter <= 0.0 {
            return backoff;
        }
        let spread = self.jitter * (2.0 * fastrand::f64() - 1.0);
        backoff.mul_f64(1.0 + spread).min(self.max_delay)
    }

    /// Runs `op` until it succeeds, fails permanently, or runs out of attempts
    ///
    /// `op` receives the zero-based attempt number. Errors for which
    /// [`FetchError::is_retryable`] is false are returned immediately.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful result
    /// * `Err(FetchError::RetriesExhausted)` - Every attempt failed with a retryable error
    /// * `Err(FetchError)` - A non-retryable error
    pub async fn execute<F, Fut, T>(&self, url: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(FetchError::RetriesExhausted {
                            url: url.to_string(),
                            attempts,
                            last: Box::new(e),
                        });
                    }

                    let delay = self.delay_for(attempt - 1);
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}; retrying in {:.2}s",
                        attempt,
                        attempts,
                        url,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
