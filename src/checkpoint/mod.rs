//! Checkpoint module for resumable scrapes
//!
//! This module persists scrape progress so an interrupted run can resume:
//! - One SQLite database per source (`<checkpoint_dir>/<source>.db`)
//! - Run tracking keyed by a fingerprint of the target set
//! - Per-target progress (next page URL, pages done)
//! - Reviews collected so far, committed in batches with their page progress

mod schema;
mod sqlite;
mod traits;
mod writer;

pub use sqlite::SqliteCheckpoint;
pub use traits::{CheckpointError, CheckpointResult, CheckpointStore};
pub use writer::CheckpointWriter;

use crate::review::Review;
use std::path::Path;

/// Opens (or creates) the checkpoint database at `path`
pub fn open_checkpoint(path: &Path) -> CheckpointResult<SqliteCheckpoint> {
    SqliteCheckpoint::open(path)
}

/// Represents a scrape run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source: String,
    pub fingerprint: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
}

/// Represents one target within a run
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRecord {
    pub url: String,
    pub status: TargetStatus,

    /// Where to continue; `None` before the first page is scraped
    pub next_page_url: Option<String>,

    /// Pages processed so far, failed pages included
    pub pages_done: u32,
}

/// Progress of one target after a page, with the reviews that page produced
///
/// A progress entry is the unit of atomicity: its reviews and its progress
/// marker are written in the same transaction.
#[derive(Debug, Clone)]
pub struct TargetProgress {
    pub target_url: String,
    pub reviews: Vec<Review>,
    pub next_page_url: Option<String>,
    pub pages_done: u32,
    pub status: TargetStatus,
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether a later invocation may pick this run up again
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}

/// Status of a target within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TargetStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
