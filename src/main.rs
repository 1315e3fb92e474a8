//! Review-Harvest main entry point
//!
//! This is the command-line interface for the Review-Harvest review scraper.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use review_harvest::checkpoint::open_checkpoint;
use review_harvest::config::{
    compute_config_hash, load_sources_or_default, validate_settings, Settings,
};
use review_harvest::crawler::{scrape, ScrapeJob};
use review_harvest::output::{
    export_reviews, load_reviews, print_checkpoint_runs, print_run_summary, ExportFormat,
    RunSummary,
};
use review_harvest::pipeline::ReviewPipeline;
use review_harvest::{build_scraper, SourceKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Review-Harvest: a polite multi-site review scraper
///
/// Review-Harvest collects public reviews from review sites, respecting
/// per-domain rate limits, and exports them as JSON training data.
#[derive(Parser, Debug)]
#[command(name = "review-harvest")]
#[command(version)]
#[command(about = "A polite multi-site review scraper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape reviews from a source
    Scrape {
        /// Source name (see `sources`)
        source: String,

        /// Target URL or site identifier; repeatable. Defaults to the catalogue's URLs
        #[arg(short, long = "url", value_name = "URL")]
        urls: Vec<String>,

        /// Maximum number of reviews for the run
        #[arg(short, long, value_name = "N")]
        max: Option<usize>,

        /// Maximum number of pages per target
        #[arg(short, long, value_name = "N")]
        pages: Option<u32>,

        /// Output file (default: <OUTPUT_DIR>/<source>_reviews.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include source, rating, date, and author in the output
        #[arg(long)]
        metadata: bool,

        /// Start a fresh run, ignoring any checkpoint
        #[arg(long)]
        fresh: bool,

        #[command(flatten)]
        ratings: RatingArgs,
    },

    /// List the available sources
    Sources,

    /// Re-export a review file, optionally in another format
    Export {
        /// Input JSON or JSONL file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Training)]
        format: ExportFormat,

        /// First id of the renumbered output
        #[arg(long, default_value_t = 1)]
        start_id: u64,

        /// Skip cleaning, validation, and deduplication
        #[arg(long)]
        raw: bool,

        /// Keep reviews with duplicate text
        #[arg(long, conflicts_with = "raw")]
        keep_duplicates: bool,

        #[command(flatten)]
        ratings: RatingArgs,
    },

    /// Show effective settings and recent checkpoint runs
    Info,
}

/// Rating bounds applied by the pipeline; unrated reviews always pass
#[derive(clap::Args, Debug, Clone, Copy)]
struct RatingArgs {
    /// Drop reviews rated below this (0-5)
    #[arg(long, value_name = "RATING")]
    min_rating: Option<f32>,

    /// Drop reviews rated above this (0-5)
    #[arg(long, value_name = "RATING")]
    max_rating: Option<f32>,
}

impl RatingArgs {
    fn check(&self) -> anyhow::Result<()> {
        for rating in [self.min_rating, self.max_rating].into_iter().flatten() {
            if !(0.0..=5.0).contains(&rating) {
                bail!("Rating bounds must lie in 0-5, got {}", rating);
            }
        }
        if let (Some(min), Some(max)) = (self.min_rating, self.max_rating) {
            if min > max {
                bail!("--min-rating {} is above --max-rating {}", min, max);
            }
        }
        Ok(())
    }

    fn pipeline(&self, settings: &Settings) -> ReviewPipeline {
        ReviewPipeline::from_settings(settings).with_rating_range(self.min_rating, self.max_rating)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    dotenvy::dotenv().ok();
    let settings = Settings::from_env().context("Failed to read settings from the environment")?;
    validate_settings(&settings).context("Invalid settings")?;

    match cli.command {
        Command::Scrape {
            source,
            urls,
            max,
            pages,
            output,
            metadata,
            fresh,
            ratings,
        } => {
            ratings.check()?;
            let job = ScrapeJob::new(source, urls)
                .with_max_reviews(max)
                .with_max_pages(pages)
                .fresh(fresh);
            let format = if metadata {
                ExportFormat::Metadata
            } else {
                ExportFormat::Training
            };
            handle_scrape(&settings, job, output, format, ratings).await
        }
        Command::Sources => handle_sources(&settings),
        Command::Export {
            input,
            output,
            format,
            start_id,
            raw,
            keep_duplicates,
            ratings,
        } => {
            ratings.check()?;
            let pipeline = if raw {
                None
            } else if keep_duplicates {
                Some(ratings.pipeline(&settings).keep_duplicates())
            } else {
                Some(ratings.pipeline(&settings))
            };
            handle_export(&input, &output, format, start_id, pipeline.as_ref())
        }
        Command::Info => handle_info(&settings),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("review_harvest=info,warn"),
            1 => EnvFilter::new("review_harvest=debug,info"),
            2 => EnvFilter::new("review_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles `scrape`: runs the job, then cleans and exports what the run collected
async fn handle_scrape(
    settings: &Settings,
    mut job: ScrapeJob,
    output: Option<PathBuf>,
    format: ExportFormat,
    ratings: RatingArgs,
) -> anyhow::Result<()> {
    let kind: SourceKind = job.source.parse()?;
    job.source = kind.name().to_string();

    let catalogue = load_sources_or_default(&settings.sources_config).with_context(|| {
        format!(
            "Failed to load source catalogue {}",
            settings.sources_config.display()
        )
    })?;
    let entry = catalogue.get(kind.name());

    if job.targets.is_empty() {
        match entry {
            Some(entry) if entry.enabled => {
                job.targets = entry.all_urls().into_iter().map(str::to_string).collect();
            }
            Some(_) => bail!(
                "Source '{}' is disabled in {}; pass --url to scrape it anyway",
                kind,
                settings.sources_config.display()
            ),
            None => bail!(
                "No URLs configured for '{}'; pass --url ({})",
                kind,
                kind.target_hint()
            ),
        }
    }

    let scraper = build_scraper(kind)?;
    if scraper.requires_browser() || entry.is_some_and(|e| e.requires_browser) {
        bail!("Source '{}' needs a browser renderer, which is not available", kind);
    }

    let rpm = settings.rate_limit_for(scraper.rate_limit_rpm(), entry.and_then(|e| e.rate_limit_rpm));
    let output_path = output.unwrap_or_else(|| settings.default_output_path(kind.name()));

    // Cancel between pages on Ctrl-C; the checkpoint keeps what was scraped
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages...");
            on_signal.cancel();
        }
    });

    let (report, reviews) = scrape(settings, Arc::from(scraper), rpm, job, cancel)
        .await
        .with_context(|| format!("Scrape of {} failed", kind))?;

    let (reviews, pipeline) = ratings.pipeline(settings).process(reviews);
    let exported = export_reviews(&reviews, &output_path, format, 1)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    print_run_summary(&RunSummary {
        report,
        pipeline,
        exported,
        output_path,
    });

    Ok(())
}

/// Handles `sources`: lists every registered source
fn handle_sources(settings: &Settings) -> anyhow::Result<()> {
    let catalogue = load_sources_or_default(&settings.sources_config).with_context(|| {
        format!(
            "Failed to load source catalogue {}",
            settings.sources_config.display()
        )
    })?;

    println!("=== Available Sources ===\n");
    for kind in SourceKind::ALL {
        let entry = catalogue.get(kind.name());
        let rpm = settings.rate_limit_for(
            kind.default_rate_limit_rpm(),
            entry.and_then(|e| e.rate_limit_rpm),
        );
        let urls = entry.map_or(0, |e| e.all_urls().len());
        let enabled = entry.map_or(true, |e| e.enabled);
        let browser = kind.requires_browser() || entry.is_some_and(|e| e.requires_browser);

        println!("  {} - {}", kind, kind.description());
        println!(
            "    {} req/min, browser: {}, configured URLs: {}{}",
            rpm,
            if browser { "yes" } else { "no" },
            urls,
            if enabled { "" } else { " (disabled)" }
        );
        println!("    Target: {}", kind.target_hint());
    }

    let enabled: Vec<&str> = catalogue.enabled().map(|(name, _)| name).collect();
    println!(
        "\nCatalogue {}: {}",
        settings.sources_config.display(),
        if enabled.is_empty() {
            "no enabled sources".to_string()
        } else {
            format!("enabled for scrape without --url: {}", enabled.join(", "))
        }
    );

    Ok(())
}

/// Handles `export`: reloads a review file and writes it in the requested format
fn handle_export(
    input: &Path,
    output: &Path,
    format: ExportFormat,
    start_id: u64,
    pipeline: Option<&ReviewPipeline>,
) -> anyhow::Result<()> {
    let reviews =
        load_reviews(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let loaded = reviews.len();

    let reviews = match pipeline {
        None => reviews,
        Some(pipeline) => {
            let (kept, stats) = pipeline.process(reviews);
            println!(
                "Pipeline: {} in, {} invalid, {} outside rating range, {} duplicates, {} kept",
                stats.input,
                stats.invalid + stats.emptied,
                stats.off_rating,
                stats.duplicates,
                stats.output
            );
            kept
        }
    };

    let written = export_reviews(&reviews, output, format, start_id)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "✓ Exported {} of {} reviews to {} ({})",
        written,
        loaded,
        output.display(),
        format
    );

    Ok(())
}

/// Handles `info`: shows effective settings and what the checkpoints hold
fn handle_info(settings: &Settings) -> anyhow::Result<()> {
    println!("=== Review-Harvest {} ===\n", env!("CARGO_PKG_VERSION"));

    println!("Requests:");
    println!("  Max concurrent: {}", settings.max_concurrent);
    println!(
        "  Delay: {:.1}-{:.1}s",
        settings.delay_min, settings.delay_max
    );
    println!("  Rate limit: {} req/min per domain", settings.rate_limit_rpm);
    println!("  Timeout: {}s", settings.request_timeout);
    println!("  Max retries: {}", settings.max_retries);
    println!("  User agent: {}", settings.user_agent);

    println!("\nReviews:");
    println!(
        "  Length: {}-{} characters",
        settings.min_review_length, settings.max_review_length
    );
    println!("  Checkpoint batch: {}", settings.checkpoint_batch);

    println!("\nPaths:");
    println!("  Output: {}", settings.output_dir.display());
    println!("  Checkpoints: {}", settings.checkpoint_dir.display());
    if settings.sources_config.exists() {
        let hash = compute_config_hash(&settings.sources_config).with_context(|| {
            format!("Failed to read {}", settings.sources_config.display())
        })?;
        println!(
            "  Sources: {} (sha256 {})",
            settings.sources_config.display(),
            &hash[..12]
        );
    } else {
        println!("  Sources: {} (not found)", settings.sources_config.display());
    }

    println!("\nRecent runs:");
    let mut any = false;
    for kind in SourceKind::ALL {
        let path = settings.checkpoint_path(kind.name());
        if !path.exists() {
            continue;
        }
        any = true;
        let store = open_checkpoint(&path)
            .with_context(|| format!("Failed to open checkpoint {}", path.display()))?;
        print_checkpoint_runs(kind.name(), &store, 5)?;
    }
    if !any {
        println!("  (none)");
    }

    Ok(())
}
