//! Output module for exporting reviews and reporting runs
//!
//! This module handles:
//! - Writing reviews in the training, metadata, full, and JSONL formats
//! - Reading previously exported files back for re-processing
//! - Printing run and checkpoint summaries

pub mod stats;

pub use stats::{print_checkpoint_runs, print_run_summary, RunSummary};

use crate::review::Review;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Shape of an exported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    /// JSON array of `{id, text}`
    #[default]
    Training,

    /// JSON array of `{id, text, source, rating, date, author}`
    Metadata,

    /// JSON array with every non-null field
    Full,

    /// One `{id, text}` object per line
    Jsonl,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Training => "training",
            Self::Metadata => "metadata",
            Self::Full => "full",
            Self::Jsonl => "jsonl",
        };
        f.write_str(name)
    }
}

/// Writes reviews to `path`, renumbering ids from `start_id`
///
/// Parent directories are created as needed. JSON output is pretty-printed
/// UTF-8 with non-ASCII characters kept as-is.
///
/// # Returns
///
/// * `Ok(usize)` - Number of reviews written
/// * `Err(HarvestError)` - The file could not be created or written
pub fn export_reviews(
    reviews: &[Review],
    path: &Path,
    format: ExportFormat,
    start_id: u64,
) -> crate::Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let renumbered: Vec<Review> = reviews
        .iter()
        .zip(start_id..)
        .map(|(review, id)| Review {
            id,
            ..review.clone()
        })
        .collect();

    let mut writer = BufWriter::new(File::create(path)?);
    match format {
        ExportFormat::Training => {
            let records: Vec<_> = renumbered.iter().map(Review::to_training_record).collect();
            write_pretty(&mut writer, &records)?;
        }
        ExportFormat::Metadata => {
            let records: Vec<_> = renumbered.iter().map(Review::to_metadata_record).collect();
            write_pretty(&mut writer, &records)?;
        }
        ExportFormat::Full => write_pretty(&mut writer, &renumbered)?,
        ExportFormat::Jsonl => {
            for review in &renumbered {
                serde_json::to_writer(&mut writer, &review.to_training_record())?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;

    tracing::info!(
        "Exported {} reviews to {} ({})",
        renumbered.len(),
        path.display(),
        format
    );
    Ok(renumbered.len())
}

fn write_pretty<W: Write, T: Serialize>(writer: &mut W, value: &T) -> crate::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Reads reviews from a JSON array or a JSON Lines file
///
/// Items that are not valid reviews, or whose text is blank, are skipped
/// with a warning. A file that is not JSON at all is an error.
pub fn load_reviews(path: &Path) -> crate::Result<Vec<Review>> {
    let content = fs::read_to_string(path)?;
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?
    };

    let total = items.len();
    let mut reviews = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Review>(item) {
            Ok(review) if review.text.trim().is_empty() => {
                tracing::warn!("Skipping item {} in {}: empty text", index, path.display());
            }
            Ok(review) => reviews.push(review),
            Err(e) => {
                tracing::warn!("Skipping item {} in {}: {}", index, path.display(), e);
            }
        }
    }

    tracing::info!(
        "Loaded {} of {} reviews from {}",
        reviews.len(),
        total,
        path.display()
    );
    Ok(reviews)
}
