//! Checkpoint traits and error types

use crate::checkpoint::{RunRecord, RunStatus, TargetProgress, TargetRecord};
use crate::review::Review;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for CheckpointError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

/// Trait for checkpoint backends
///
/// The store is owned by a single task; writes take `&mut self`.
pub trait CheckpointStore: Send {
    // ===== Run Management =====

    /// Creates a new run in the `running` state and returns its id
    fn create_run(&mut self, source: &str, fingerprint: &str) -> CheckpointResult<i64>;

    /// Latest `running` or `interrupted` run with the same source and fingerprint
    fn find_resumable_run(
        &self,
        source: &str,
        fingerprint: &str,
    ) -> CheckpointResult<Option<RunRecord>>;

    fn get_run(&self, run_id: i64) -> CheckpointResult<RunRecord>;

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> CheckpointResult<()>;

    /// Marks a run as completed with a finish timestamp
    fn complete_run(&mut self, run_id: i64) -> CheckpointResult<()>;

    /// Most recent runs first
    fn list_runs(&self, limit: usize) -> CheckpointResult<Vec<RunRecord>>;

    // ===== Targets =====

    /// Registers targets as `pending`; already registered targets are left untouched
    fn register_targets(&mut self, run_id: i64, urls: &[String]) -> CheckpointResult<()>;

    /// Targets of a run in registration order
    fn load_targets(&self, run_id: i64) -> CheckpointResult<Vec<TargetRecord>>;

    // ===== Reviews =====

    /// Writes reviews and target progress in one transaction
    fn commit_batch(&mut self, run_id: i64, batch: &[TargetProgress]) -> CheckpointResult<()>;

    /// Reviews of a run ordered by id
    fn load_reviews(&self, run_id: i64) -> CheckpointResult<Vec<Review>>;

    fn count_reviews(&self, run_id: i64) -> CheckpointResult<u64>;

    fn max_review_id(&self, run_id: i64) -> CheckpointResult<Option<u64>>;

    // ===== Errors =====

    /// Records a page that failed after retries
    fn record_error(&mut self, run_id: i64, url: &str, message: &str) -> CheckpointResult<()>;

    fn error_count(&self, run_id: i64) -> CheckpointResult<u64>;
}
