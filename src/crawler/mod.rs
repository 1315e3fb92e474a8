//! Crawler module for scrape orchestration
//!
//! This module drives a scrape run, including:
//! - Target resolution and run fingerprinting
//! - Checkpoint resume
//! - Bounded concurrent target workers
//! - Review id assignment and batched checkpoint commits

mod coordinator;

pub use coordinator::{
    compute_fingerprint, Coordinator, ScrapeJob, ScrapeReport, MAX_CONSECUTIVE_FAILURES,
};

use crate::checkpoint::open_checkpoint;
use crate::config::Settings;
use crate::http::HttpClient;
use crate::sources::Scraper;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a scrape job with the rate-limited HTTP client and the source's checkpoint file
///
/// This is the main entry point for scraping. It will:
/// 1. Open `<checkpoint_dir>/<source>.db`
/// 2. Build the HTTP client for the given rate limit
/// 3. Run the job through a [`Coordinator`]
/// 4. Read the run's reviews back from the checkpoint
/// 5. Log per-domain request counters
///
/// # Arguments
///
/// * `settings` - Runtime settings
/// * `scraper` - Scraper for the job's source
/// * `rate_limit_rpm` - Requests per minute allowed per domain
/// * `job` - What to scrape
/// * `cancel` - Cancels the run between page fetches
pub async fn scrape(
    settings: &Settings,
    scraper: Arc<dyn Scraper>,
    rate_limit_rpm: u32,
    job: ScrapeJob,
    cancel: CancellationToken,
) -> crate::Result<(ScrapeReport, Vec<crate::review::Review>)> {
    let store = open_checkpoint(&settings.checkpoint_path(&job.source))?;
    let fetcher = Arc::new(HttpClient::new(settings, rate_limit_rpm)?);

    tracing::info!(
        "Scraping {} at {} requests/min per domain",
        job.source,
        rate_limit_rpm
    );

    let mut coordinator = Coordinator::new(
        settings.clone(),
        scraper,
        fetcher.clone(),
        Box::new(store),
    );
    let report = coordinator.run(job, cancel).await?;
    let reviews = coordinator.store().load_reviews(report.run_id)?;

    for (domain, stats) in fetcher.rate_limiter().stats() {
        tracing::info!(
            "{}: {} requests, {} throttled, ending at {} requests/min",
            domain,
            stats.requests,
            stats.throttled,
            stats.rpm
        );
    }

    Ok((report, reviews))
}
