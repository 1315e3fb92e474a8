//! SQLite checkpoint implementation

use crate::checkpoint::schema::initialize_schema;
use crate::checkpoint::traits::{CheckpointError, CheckpointResult, CheckpointStore};
use crate::checkpoint::{RunRecord, RunStatus, TargetProgress, TargetRecord, TargetStatus};
use crate::review::Review;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, source, fingerprint, started_at, finished_at, status";

/// SQLite checkpoint backend
pub struct SqliteCheckpoint {
    conn: Connection,
}

impl SqliteCheckpoint {
    /// Opens or creates the checkpoint database at `path`
    ///
    /// Missing parent directories are created.
    pub fn open(path: &Path) -> CheckpointResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> CheckpointResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source: row.get(1)?,
        fingerprint: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Failed),
    })
}

impl CheckpointStore for SqliteCheckpoint {
    // ===== Run Management =====

    fn create_run(&mut self, source: &str, fingerprint: &str) -> CheckpointResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (source, fingerprint, started_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![source, fingerprint, now, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_resumable_run(
        &self,
        source: &str,
        fingerprint: &str,
    ) -> CheckpointResult<Option<RunRecord>> {
        let query = format!(
            "SELECT {} FROM runs
             WHERE source = ?1 AND fingerprint = ?2 AND status IN (?3, ?4)
             ORDER BY id DESC LIMIT 1",
            RUN_COLUMNS
        );
        let run = self
            .conn
            .query_row(
                &query,
                params![
                    source,
                    fingerprint,
                    RunStatus::Running.to_db_string(),
                    RunStatus::Interrupted.to_db_string()
                ],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    fn get_run(&self, run_id: i64) -> CheckpointResult<RunRecord> {
        let query = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&query, params![run_id], run_from_row)
            .optional()?
            .ok_or(CheckpointError::RunNotFound(run_id))
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> CheckpointResult<()> {
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1 WHERE id = ?2",
            params![status.to_db_string(), run_id],
        )?;
        if updated == 0 {
            return Err(CheckpointError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64) -> CheckpointResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![RunStatus::Completed.to_db_string(), now, run_id],
        )?;
        if updated == 0 {
            return Err(CheckpointError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn list_runs(&self, limit: usize) -> CheckpointResult<Vec<RunRecord>> {
        let query = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&query)?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Targets =====

    fn register_targets(&mut self, run_id: i64, urls: &[String]) -> CheckpointResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO targets (run_id, url, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for url in urls {
                stmt.execute(params![
                    run_id,
                    url,
                    TargetStatus::Pending.to_db_string(),
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_targets(&self, run_id: i64) -> CheckpointResult<Vec<TargetRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT url, status, next_page_url, pages_done FROM targets
             WHERE run_id = ?1 ORDER BY id",
        )?;
        let targets = stmt
            .query_map(params![run_id], |row| {
                Ok(TargetRecord {
                    url: row.get(0)?,
                    status: TargetStatus::from_db_string(&row.get::<_, String>(1)?)
                        .unwrap_or(TargetStatus::Pending),
                    next_page_url: row.get(2)?,
                    pages_done: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    // ===== Reviews =====

    fn commit_batch(&mut self, run_id: i64, batch: &[TargetProgress]) -> CheckpointResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut insert_review = tx.prepare(
                "INSERT OR REPLACE INTO reviews (run_id, id, target_url, payload)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut update_target = tx.prepare(
                "UPDATE targets SET status = ?1, next_page_url = ?2, pages_done = ?3, updated_at = ?4
                 WHERE run_id = ?5 AND url = ?6",
            )?;

            for progress in batch {
                for review in &progress.reviews {
                    let payload = serde_json::to_string(review)?;
                    insert_review.execute(params![
                        run_id,
                        review.id as i64,
                        progress.target_url,
                        payload
                    ])?;
                }

                update_target.execute(params![
                    progress.status.to_db_string(),
                    progress.next_page_url,
                    progress.pages_done,
                    now,
                    run_id,
                    progress.target_url
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_reviews(&self, run_id: i64) -> CheckpointResult<Vec<Review>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, payload FROM reviews WHERE run_id = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut reviews = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            match serde_json::from_str::<Review>(&payload) {
                Ok(review) => reviews.push(review),
                Err(e) => {
                    tracing::warn!("Skipping unreadable checkpointed review {}: {}", id, e);
                }
            }
        }

        Ok(reviews)
    }

    fn count_reviews(&self, run_id: i64) -> CheckpointResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM reviews WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn max_review_id(&self, run_id: i64) -> CheckpointResult<Option<u64>> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(id) FROM reviews WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(max.map(|id| id as u64))
    }

    // ===== Errors =====

    fn record_error(&mut self, run_id: i64, url: &str, message: &str) -> CheckpointResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO run_errors (run_id, url, message, occurred_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, url, message, now],
        )?;
        Ok(())
    }

    fn error_count(&self, run_id: i64) -> CheckpointResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM run_errors WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
