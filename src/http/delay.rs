use std::time::Duration;

/// Randomized pause between consecutive requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayManager {
    min: Duration,
    max: Duration,
}

impl DelayManager {
    pub fn new(min: Duration, max: Duration) -> Self {
        if max < min {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// A manager that never sleeps
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draws a delay uniformly from `[min, max]`
    pub fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        self.min + (self.max - self.min).mul_f64(fastrand::f64())
    }

    pub async fn wait(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::trace!("Sleeping {:.2}s before next request", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
        }
    }
}
