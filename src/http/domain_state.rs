/// Tracks the request history of one domain during a scrape
///
/// The token bucket itself lives in the rate limiter. This keeps the counters
/// reported after a run and the rate currently in force.
#[derive(Debug, Clone)]
pub struct DomainState {
    /// Number of requests made to this domain in the current scrape
    pub request_count: u32,

    /// Number of HTTP 429/503 responses seen from this domain
    pub throttled_count: u32,

    /// Requests per minute currently enforced for this domain
    pub rpm: u32,
}

impl DomainState {
    /// Creates a new DomainState enforcing `rpm`
    pub fn new(rpm: u32) -> Self {
        Self {
            request_count: 0,
            throttled_count: 0,
            rpm,
        }
    }

    /// Records that a request was made to this domain
    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    /// Records a throttling response and lowers the rate
    ///
    /// The new rate is 70% of the current one, never below `min_rpm`.
    ///
    /// # Returns
    ///
    /// `Some(new_rpm)` if the rate changed, `None` if it was already at the floor
    pub fn mark_throttled(&mut self, min_rpm: u32) -> Option<u32> {
        self.throttled_count += 1;

        let reduced = ((self.rpm as f64) * 0.7).floor() as u32;
        let next = reduced.max(min_rpm).max(1);
        if next < self.rpm {
            self.rpm = next;
            Some(next)
        } else {
            None
        }
    }
}

/// Snapshot of a domain's counters, for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainStats {
    pub requests: u32,
    pub throttled: u32,
    pub rpm: u32,
}

impl From<&DomainState> for DomainStats {
    fn from(state: &DomainState) -> Self {
        Self {
            requests: state.request_count,
            throttled: state.throttled_count,
            rpm: state.rpm,
        }
    }
}
