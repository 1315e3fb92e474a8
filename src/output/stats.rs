//! Run summaries
//!
//! This module prints what a scrape produced and what the checkpoint
//! database remembers about earlier runs.

use crate::checkpoint::{CheckpointResult, CheckpointStore};
use crate::crawler::ScrapeReport;
use crate::pipeline::PipelineStats;
use std::path::PathBuf;

/// Everything reported after a `scrape`
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: ScrapeReport,

    /// Pipeline counters for the exported reviews
    pub pipeline: PipelineStats,

    pub exported: usize,
    pub output_path: PathBuf,
}

/// Prints a run summary to stdout in a formatted manner
pub fn print_run_summary(summary: &RunSummary) {
    let report = &summary.report;

    println!("=== Scrape Summary: {} ===\n", report.source);

    println!("Run:");
    println!(
        "  Run id: {}{}",
        report.run_id,
        if report.resumed { " (resumed)" } else { "" }
    );
    println!("  Duration: {:.1}s", report.duration.as_secs_f64());
    if report.cancelled {
        println!("  Status: interrupted (resume by running the same command again)");
    }
    println!();

    println!("Pages:");
    println!("  Scraped: {}", report.pages_scraped);
    println!("  Failed: {}", report.pages_failed);
    println!(
        "  Targets completed: {} / {}",
        report.targets_completed, report.targets
    );
    if report.targets_failed > 0 {
        println!("  Targets abandoned: {}", report.targets_failed);
    }
    println!();

    println!("Reviews:");
    println!("  New this run: {}", report.reviews);
    println!("  Total in checkpoint: {}", report.total_reviews);
    println!("  Invalid: {}", summary.pipeline.invalid + summary.pipeline.emptied);
    if summary.pipeline.off_rating > 0 {
        println!("  Outside rating range: {}", summary.pipeline.off_rating);
    }
    println!("  Duplicates: {}", summary.pipeline.duplicates);
    println!();

    let keep_rate = if summary.pipeline.input > 0 {
        (summary.exported as f64 / summary.pipeline.input as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Exported {} reviews ({:.1}% kept) to {}",
        summary.exported,
        keep_rate,
        summary.output_path.display()
    );
}

/// Prints the most recent runs recorded in a checkpoint database
pub fn print_checkpoint_runs(
    source: &str,
    store: &dyn CheckpointStore,
    limit: usize,
) -> CheckpointResult<()> {
    let runs = store.list_runs(limit)?;
    if runs.is_empty() {
        println!("  {}: no runs", source);
        return Ok(());
    }

    println!("  {}:", source);
    for run in runs {
        let reviews = store.count_reviews(run.id)?;
        let errors = store.error_count(run.id)?;
        let targets = store.load_targets(run.id)?;
        let done = targets.iter().filter(|t| t.status.is_finished()).count();

        println!(
            "    #{} {} started {} - {} reviews, {}/{} targets, {} errors",
            run.id,
            run.status.to_db_string(),
            run.started_at,
            reviews,
            done,
            targets.len(),
            errors
        );
    }
    Ok(())
}
