//! Per-domain request rate limiting
//!
//! Each domain gets its own governor token bucket with a burst of one and a
//! replenish period of `60s / rpm`, so requests to a domain are spaced evenly
//! and never exceed the configured requests per minute. Domains that answer
//! with HTTP 429 or 503 are slowed down further.

use crate::http::domain_state::{DomainState, DomainStats};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::Quota;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Lowest rate the adaptive slow-down will reduce a domain to
pub const DEFAULT_MIN_RPM: u32 = 5;

struct DomainEntry {
    limiter: Arc<DirectLimiter>,
    state: DomainState,
}

impl DomainEntry {
    fn new(rpm: u32) -> Self {
        Self {
            limiter: Arc::new(DirectLimiter::direct(quota_for(rpm))),
            state: DomainState::new(rpm),
        }
    }
}

/// Token-bucket rate limiter keyed by domain
pub struct RateLimiter {
    rpm: u32,
    min_rpm: u32,
    domains: Mutex<HashMap<String, DomainEntry>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `rpm` requests per minute to each domain
    pub fn new(rpm: u32) -> Self {
        let rpm = rpm.max(1);
        Self {
            rpm,
            min_rpm: DEFAULT_MIN_RPM.min(rpm),
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// The configured rate for domains that have not been slowed down
    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    /// Waits until a request to `domain` is allowed, then records it
    pub async fn acquire(&self, domain: &str) {
        let limiter = self.limiter_for(domain);
        limiter.until_ready().await;
        self.update_state(domain, |state| state.record_request());
    }

    /// Takes a permit for `domain` only if one is available right now
    pub fn try_acquire(&self, domain: &str) -> bool {
        let allowed = self.limiter_for(domain).check().is_ok();
        if allowed {
            self.update_state(domain, |state| state.record_request());
        }
        allowed
    }

    /// Slows a domain down after it signalled overload (HTTP 429/503)
    ///
    /// # Returns
    ///
    /// The rate now in force for the domain
    pub fn record_throttled(&self, domain: &str) -> u32 {
        let mut domains = self.lock();
        let entry = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainEntry::new(self.rpm));

        if let Some(rpm) = entry.state.mark_throttled(self.min_rpm) {
            tracing::warn!("{} is throttling requests, slowing down to {} rpm", domain, rpm);
            let limiter = DirectLimiter::direct(quota_for(rpm));
            // The request that triggered the throttle counts against the new bucket.
            let _ = limiter.check();
            entry.limiter = Arc::new(limiter);
        }

        entry.state.rpm
    }

    /// The rate currently enforced for `domain`
    pub fn current_rpm(&self, domain: &str) -> u32 {
        self.lock()
            .get(domain)
            .map(|entry| entry.state.rpm)
            .unwrap_or(self.rpm)
    }

    /// Counters for every domain seen so far, sorted by domain
    pub fn stats(&self) -> Vec<(String, DomainStats)> {
        let mut stats: Vec<_> = self
            .lock()
            .iter()
            .map(|(domain, entry)| (domain.clone(), DomainStats::from(&entry.state)))
            .collect();
        stats.sort_by(|a, b| a.0.cmp(&b.0));
        stats
    }

    fn limiter_for(&self, domain: &str) -> Arc<DirectLimiter> {
        let mut domains = self.lock();
        let entry = domains
            .entry(domain.to_string())
            .or_insert_with(|| DomainEntry::new(self.rpm));
        Arc::clone(&entry.limiter)
    }

    fn update_state<F: FnOnce(&mut DomainState)>(&self, domain: &str, f: F) {
        if let Some(entry) = self.lock().get_mut(domain) {
            f(&mut entry.state);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DomainEntry>> {
        self.domains.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn quota_for(rpm: u32) -> Quota {
    let period = Duration::from_secs(60) / rpm.max(1);
    Quota::with_period(period).unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_second_immediate_request_is_denied() {
        let limiter = RateLimiter::new(60);
        assert!(limiter.try_acquire("example.com"));
        assert!(!limiter.try_acquire("example.com"));
    }

    #[test]
    fn test_domains_are_independent() {
        let limiter = RateLimiter::new(10);
        assert!(limiter.try_acquire("a.example"));
        assert!(limiter.try_acquire("b.example"));
        assert!(!limiter.try_acquire("a.example"));
    }

    #[test]
    fn test_never_exceeds_rpm_within_window() {
        // 6000 rpm: one request every 10ms
        let limiter = RateLimiter::new(6000);
        let start = Instant::now();
        let mut granted = 0;
        while start.elapsed() < Duration::from_millis(50) {
            if limiter.try_acquire("example.com") {
                granted += 1;
            }
        }
        // Window of 50ms admits at most the initial permit plus five refills.
        assert!(granted >= 1);
        assert!(granted <= 6, "granted {} permits in 50ms", granted);
    }

    #[tokio::test]
    async fn test_acquire_spaces_requests() {
        let limiter = RateLimiter::new(6000);
        let start = Instant::now();
        for _ in 0..4 {
            limiter.acquire("example.com").await;
        }
        // First permit is immediate, the next three wait ~10ms each.
        assert!(start.elapsed() >= Duration::from_millis(25));

        let stats = limiter.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].1.requests, 4);
    }

    #[test]
    fn test_throttling_slows_domain() {
        let limiter = RateLimiter::new(20);
        assert_eq!(limiter.record_throttled("example.com"), 14);
        assert_eq!(limiter.current_rpm("example.com"), 14);
        assert_eq!(limiter.current_rpm("other.example"), 20);

        // The replacement bucket starts out spent.
        assert!(!limiter.try_acquire("example.com"));
    }

    #[test]
    fn test_throttling_respects_floor() {
        let limiter = RateLimiter::new(3);
        assert_eq!(limiter.record_throttled("example.com"), 3);
        assert_eq!(limiter.stats()[0].1.throttled, 1);
    }
}
