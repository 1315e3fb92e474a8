//! Scrape coordinator - main scrape orchestration logic
//!
//! This module contains the loop that drives one scrape run, including:
//! - Resolving and fingerprinting targets
//! - Creating or resuming a checkpointed run
//! - Scraping targets concurrently, each page in order
//! - Assigning review ids and committing progress in batches
//! - Handling cancellation and the review cap

use crate::checkpoint::{
    CheckpointStore, CheckpointWriter, RunStatus, TargetProgress, TargetRecord, TargetStatus,
};
use crate::config::Settings;
use crate::http::Fetch;
use crate::review::{RawReview, ReviewFactory};
use crate::sources::{PageRequest, Scraper};
use crate::HarvestError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Consecutive page failures after which a target is abandoned
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// What to scrape
#[derive(Debug, Clone)]
pub struct ScrapeJob {
    pub source: String,

    /// Target URLs or site-specific identifiers
    pub targets: Vec<String>,

    /// Cap on reviews for the whole run
    pub max_reviews: Option<usize>,

    /// Cap on pages per target
    pub max_pages: Option<u32>,

    /// Ignore any resumable checkpoint
    pub fresh: bool,
}

impl ScrapeJob {
    pub fn new(source: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            source: source.into(),
            targets,
            max_reviews: None,
            max_pages: None,
            fresh: false,
        }
    }

    pub fn with_max_reviews(mut self, max_reviews: Option<usize>) -> Self {
        self.max_reviews = max_reviews;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }
}

/// Outcome of a scrape run
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeReport {
    pub run_id: i64,
    pub source: String,

    /// Whether an earlier checkpointed run was continued
    pub resumed: bool,

    /// Reviews collected by this invocation
    pub reviews: u64,

    /// Reviews stored for the run, earlier invocations included
    pub total_reviews: u64,

    pub pages_scraped: u64,
    pub pages_failed: u64,
    pub targets: usize,
    pub targets_completed: usize,
    pub targets_failed: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

/// How a worker reached a progress report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    /// The page was fetched and parsed
    Scraped,

    /// The page could not be fetched or parsed
    Failed,

    /// Nothing was fetched; the page limit was already reached
    Skipped,
}

/// Progress report sent from a target worker to the coordinator
#[derive(Debug)]
struct PageOutcome {
    target: Url,
    reviews: Vec<RawReview>,
    pages_done: u32,
    next: Option<Url>,
    status: TargetStatus,
    kind: PageKind,
}

#[derive(Debug)]
enum WorkerEvent {
    Page(PageOutcome),
    Error { url: Url, message: String },
}

/// Running totals kept by the coordinator task
#[derive(Debug, Default)]
struct Tally {
    reviews: u64,
    total_reviews: u64,
    pages_scraped: u64,
    pages_failed: u64,
    targets_completed: usize,
    targets_failed: usize,

    /// The review cap stopped the run
    capped: bool,
}

/// Main scrape coordinator structure
///
/// Workers only fetch and parse; the coordinator task owns the checkpoint
/// store and the id counter, so ids are assigned in the order pages arrive.
pub struct Coordinator {
    settings: Settings,
    scraper: Arc<dyn Scraper>,
    fetcher: Arc<dyn Fetch>,
    store: Box<dyn CheckpointStore>,
}

impl Coordinator {
    pub fn new(
        settings: Settings,
        scraper: Arc<dyn Scraper>,
        fetcher: Arc<dyn Fetch>,
        store: Box<dyn CheckpointStore>,
    ) -> Self {
        Self {
            settings,
            scraper,
            fetcher,
            store,
        }
    }

    /// The checkpoint store, for reading back a run's reviews
    pub fn store(&self) -> &dyn CheckpointStore {
        self.store.as_ref()
    }

    /// Runs a scrape job to completion, cancellation, or the review cap
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeReport)` - The run finished or was interrupted cleanly
    /// * `Err(HarvestError)` - Targets could not be resolved or the checkpoint failed
    pub async fn run(
        &mut self,
        job: ScrapeJob,
        cancel: CancellationToken,
    ) -> crate::Result<ScrapeReport> {
        let start_time = Instant::now();
        let targets = resolve_targets(self.scraper.as_ref(), &job)?;
        let fingerprint = compute_fingerprint(&job.source, &targets);

        let (run_id, resumed) = self.open_run(&job, &fingerprint, &targets)?;
        let records = self.store.load_targets(run_id)?;
        let next_id = self.store.max_review_id(run_id)?.map_or(1, |max| max + 1);

        let mut tally = Tally {
            total_reviews: self.store.count_reviews(run_id)?,
            targets_completed: records
                .iter()
                .filter(|r| r.status == TargetStatus::Completed)
                .count(),
            ..Tally::default()
        };

        let pending: Vec<PageRequest> = records
            .iter()
            .filter(|record| record.status != TargetStatus::Completed)
            .filter_map(|record| self.start_page(record))
            .collect();

        tracing::info!(
            "{} run {}: {} targets ({} left), reviews continue at id {}",
            if resumed { "Resuming" } else { "Starting" },
            run_id,
            records.len(),
            pending.len(),
            next_id
        );

        let stop = cancel.child_token();
        if reached_cap(job.max_reviews, tally.total_reviews) {
            tracing::info!("Review cap already reached for run {}", run_id);
            tally.capped = true;
            stop.cancel();
        }

        // Spawn one worker per target, bounded by the request pool size
        let (tx, mut rx) = mpsc::channel::<WorkerEvent>(self.settings.max_concurrent.max(1) * 4);
        let pool = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(pending.len());
        for start in pending {
            let worker = TargetWorker {
                scraper: Arc::clone(&self.scraper),
                fetcher: Arc::clone(&self.fetcher),
                max_pages: job.max_pages,
                stop: stop.clone(),
                events: tx.clone(),
            };
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return;
                };
                worker.run(start).await;
            }));
        }
        drop(tx);

        let mut factory = ReviewFactory::new(job.source.clone(), next_id);
        let mut writer =
            CheckpointWriter::new(self.store.as_mut(), run_id, self.settings.checkpoint_batch);

        let drained = drain_events(
            &mut rx,
            &mut writer,
            &mut factory,
            &mut tally,
            job.max_reviews,
            &stop,
            start_time,
        )
        .await;

        if drained.is_err() {
            stop.cancel();
        }
        drop(rx);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Target worker panicked: {}", e);
            }
        }

        match drained.and_then(|_| writer.finish().map_err(HarvestError::from)) {
            Ok(commits) => {
                tracing::debug!("Run {}: {} checkpoint commits", run_id, commits);
            }
            Err(e) => {
                tracing::error!("Run {} failed: {}", run_id, e);
                if let Err(status_err) = self.store.update_run_status(run_id, RunStatus::Failed) {
                    tracing::warn!("Could not mark run {} as failed: {}", run_id, status_err);
                }
                return Err(e);
            }
        }

        // Unfinished targets keep the run resumable.
        let cancelled = cancel.is_cancelled();
        let unfinished = tally.targets_completed < records.len();
        if cancelled || tally.targets_failed > 0 || (tally.capped && unfinished) {
            self.store
                .update_run_status(run_id, RunStatus::Interrupted)?;
        } else {
            self.store.complete_run(run_id)?;
        }

        let report = ScrapeReport {
            run_id,
            source: job.source,
            resumed,
            reviews: tally.reviews,
            total_reviews: tally.total_reviews,
            pages_scraped: tally.pages_scraped,
            pages_failed: tally.pages_failed,
            targets: records.len(),
            targets_completed: tally.targets_completed,
            targets_failed: tally.targets_failed,
            cancelled,
            duration: start_time.elapsed(),
        };

        tracing::info!(
            "Run {} {}: {} new reviews ({} total), {} pages, {} failed pages in {:?}",
            run_id,
            if cancelled { "interrupted" } else { "finished" },
            report.reviews,
            report.total_reviews,
            report.pages_scraped,
            report.pages_failed,
            report.duration
        );

        Ok(report)
    }

    /// Finds a resumable run for this target set or creates a new one
    fn open_run(
        &mut self,
        job: &ScrapeJob,
        fingerprint: &str,
        targets: &[Url],
    ) -> crate::Result<(i64, bool)> {
        let existing = if job.fresh {
            None
        } else {
            self.store.find_resumable_run(&job.source, fingerprint)?
        };

        let (run_id, resumed) = match existing {
            Some(run) => {
                self.store.update_run_status(run.id, RunStatus::Running)?;
                (run.id, true)
            }
            None => (self.store.create_run(&job.source, fingerprint)?, false),
        };

        let urls: Vec<String> = targets.iter().map(Url::to_string).collect();
        self.store.register_targets(run_id, &urls)?;
        Ok((run_id, resumed))
    }

    /// Where a target's worker should begin
    fn start_page(&self, record: &TargetRecord) -> Option<PageRequest> {
        let target = match Url::parse(&record.url) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Skipping stored target {}: {}", record.url, e);
                return None;
            }
        };

        let url = record
            .next_page_url
            .as_deref()
            .and_then(|next| Url::parse(next).ok())
            .unwrap_or_else(|| self.scraper.first_page(&target));

        Some(PageRequest::new(target, url, record.pages_done + 1))
    }
}

/// Consumes worker events until every worker is done
async fn drain_events(
    rx: &mut mpsc::Receiver<WorkerEvent>,
    writer: &mut CheckpointWriter<'_>,
    factory: &mut ReviewFactory,
    tally: &mut Tally,
    max_reviews: Option<usize>,
    stop: &CancellationToken,
    start_time: Instant,
) -> crate::Result<()> {
    while let Some(event) = rx.recv().await {
        match event {
            WorkerEvent::Error { url, message } => {
                writer.record_error(url.as_str(), &message)?;
            }
            WorkerEvent::Page(_) if tally.capped => {
                // Pages past the cap are left for a later run.
            }
            WorkerEvent::Page(outcome) => {
                let mut reviews = Vec::with_capacity(outcome.reviews.len());
                for raw in outcome.reviews {
                    if reached_cap(max_reviews, tally.total_reviews) {
                        break;
                    }
                    if let Some(review) = factory.create(raw, Some(outcome.target.as_str())) {
                        reviews.push(review);
                        tally.reviews += 1;
                        tally.total_reviews += 1;
                    }
                }

                match outcome.kind {
                    PageKind::Scraped => tally.pages_scraped += 1,
                    PageKind::Failed => tally.pages_failed += 1,
                    PageKind::Skipped => {}
                }
                match outcome.status {
                    TargetStatus::Completed => tally.targets_completed += 1,
                    TargetStatus::Failed => tally.targets_failed += 1,
                    _ => {}
                }

                writer.push(TargetProgress {
                    target_url: outcome.target.to_string(),
                    reviews,
                    next_page_url: outcome.next.map(String::from),
                    pages_done: outcome.pages_done,
                    status: outcome.status,
                })?;

                let pages = tally.pages_scraped + tally.pages_failed;
                if outcome.kind != PageKind::Skipped && pages % PROGRESS_INTERVAL == 0 {
                    let rate = pages as f64 / start_time.elapsed().as_secs_f64().max(0.001);
                    tracing::info!(
                        "Progress: {} pages, {} reviews, {} failed pages, {:.2} pages/sec",
                        pages,
                        tally.total_reviews,
                        tally.pages_failed,
                        rate
                    );
                }

                if reached_cap(max_reviews, tally.total_reviews) {
                    tracing::info!("Reached review cap of {}", tally.total_reviews);
                    tally.capped = true;
                    stop.cancel();
                }
            }
        }
    }
    Ok(())
}

fn reached_cap(max_reviews: Option<usize>, total: u64) -> bool {
    max_reviews.is_some_and(|max| total >= max as u64)
}

/// Scrapes the pages of one target in order
struct TargetWorker {
    scraper: Arc<dyn Scraper>,
    fetcher: Arc<dyn Fetch>,
    max_pages: Option<u32>,
    stop: CancellationToken,
    events: mpsc::Sender<WorkerEvent>,
}

impl TargetWorker {
    async fn run(self, start: PageRequest) {
        let target = start.target.clone();
        let mut page = start;
        let mut pages_done = page.number.saturating_sub(1);
        let mut failures = 0u32;

        if self.max_pages.is_some_and(|max| pages_done >= max) {
            tracing::debug!("{} already reached its page limit", target);
            self.send_page(PageOutcome {
                target,
                reviews: Vec::new(),
                pages_done,
                next: Some(page.url),
                status: TargetStatus::Completed,
                kind: PageKind::Skipped,
            })
            .await;
            return;
        }

        loop {
            if self.stop.is_cancelled() {
                tracing::debug!("Stopping {} before page {}", target, page.number);
                return;
            }

            match self.scraper.scrape_page(self.fetcher.as_ref(), &page).await {
                Ok(scraped) => {
                    failures = 0;
                    pages_done += 1;
                    let at_limit = self.max_pages.is_some_and(|max| pages_done >= max);
                    let status = if scraped.next.is_none() || at_limit {
                        TargetStatus::Completed
                    } else {
                        TargetStatus::InProgress
                    };

                    if scraped.reviews.is_empty() {
                        tracing::debug!("No reviews on page {} of {}", page.number, target);
                    }

                    let next = scraped.next.clone();
                    let delivered = self
                        .send_page(PageOutcome {
                            target: target.clone(),
                            reviews: scraped.reviews,
                            pages_done,
                            next: scraped.next,
                            status,
                            kind: PageKind::Scraped,
                        })
                        .await;

                    match next {
                        Some(next) if delivered && !at_limit => page = page.next(next),
                        _ => return,
                    }
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        "Page {} of {} failed ({}/{}): {}",
                        page.number,
                        target,
                        failures,
                        MAX_CONSECUTIVE_FAILURES,
                        e
                    );

                    let delivered = self
                        .events
                        .send(WorkerEvent::Error {
                            url: page.url.clone(),
                            message: e.to_string(),
                        })
                        .await
                        .is_ok();

                    let fallback = self.scraper.fallback_next(&page);
                    let next = match fallback {
                        Some(next) if failures < MAX_CONSECUTIVE_FAILURES => next,
                        _ => {
                            // The failed page stays as the resume point.
                            tracing::warn!("Giving up on {} at page {}", target, page.number);
                            self.send_page(PageOutcome {
                                target: target.clone(),
                                reviews: Vec::new(),
                                pages_done,
                                next: Some(page.url.clone()),
                                status: TargetStatus::Failed,
                                kind: PageKind::Failed,
                            })
                            .await;
                            return;
                        }
                    };

                    pages_done += 1;
                    let at_limit = self.max_pages.is_some_and(|max| pages_done >= max);
                    let delivered = delivered
                        && self
                            .send_page(PageOutcome {
                                target: target.clone(),
                                reviews: Vec::new(),
                                pages_done,
                                next: Some(next.clone()),
                                status: if at_limit {
                                    TargetStatus::Completed
                                } else {
                                    TargetStatus::InProgress
                                },
                                kind: PageKind::Failed,
                            })
                            .await;

                    if !delivered || at_limit {
                        return;
                    }
                    tracing::info!("Skipping to {} after failed page {}", next, page.number);
                    page = page.next(next);
                }
            }
        }
    }

    async fn send_page(&self, outcome: PageOutcome) -> bool {
        self.events.send(WorkerEvent::Page(outcome)).await.is_ok()
    }
}

/// Resolves job targets through the scraper, dropping duplicates
fn resolve_targets(scraper: &dyn Scraper, job: &ScrapeJob) -> crate::Result<Vec<Url>> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for input in &job.targets {
        let url = scraper.resolve_target(input)?;
        if seen.insert(url.to_string()) {
            targets.push(url);
        } else {
            tracing::debug!("Ignoring duplicate target {}", url);
        }
    }

    if targets.is_empty() {
        return Err(HarvestError::NoTargets(job.source.clone()));
    }
    Ok(targets)
}

/// Identifies a target set: SHA-256 over the source and sorted target URLs
pub fn compute_fingerprint(source: &str, targets: &[Url]) -> String {
    let mut urls: Vec<&str> = targets.iter().map(Url::as_str).collect();
    urls.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    for url in urls {
        hasher.update(b"\n");
        hasher.update(url.as_bytes());
    }
    hex::encode(hasher.finalize())
}
