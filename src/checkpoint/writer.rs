use crate::checkpoint::{CheckpointResult, CheckpointStore, TargetProgress};

/// Buffers scraped pages and commits them to a [`CheckpointStore`] in batches
///
/// A flush happens once `batch_size` reviews are pending, whenever a target
/// reaches a final status, and when the writer is finished. Each buffered
/// entry carries its page's reviews together with the progress marker, so a
/// crash loses at most the pending batch and never records a page twice.
pub struct CheckpointWriter<'a> {
    store: &'a mut dyn CheckpointStore,
    run_id: i64,
    batch_size: usize,
    pending: Vec<TargetProgress>,
    pending_reviews: usize,
    committed_reviews: u64,
    commits: u64,
}

impl<'a> CheckpointWriter<'a> {
    pub fn new(store: &'a mut dyn CheckpointStore, run_id: i64, batch_size: usize) -> Self {
        Self {
            store,
            run_id,
            batch_size: batch_size.max(1),
            pending: Vec::new(),
            pending_reviews: 0,
            committed_reviews: 0,
            commits: 0,
        }
    }

    /// Queues one page worth of progress, flushing when the batch is full
    ///
    /// # Returns
    ///
    /// `true` if this call triggered a commit
    pub fn push(&mut self, progress: TargetProgress) -> CheckpointResult<bool> {
        let finished = progress.status.is_finished();
        self.pending_reviews += progress.reviews.len();
        self.pending.push(progress);

        if finished || self.pending_reviews >= self.batch_size {
            self.flush()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Commits everything pending in one transaction
    pub fn flush(&mut self) -> CheckpointResult<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        self.store.commit_batch(self.run_id, &self.pending)?;

        let committed = self.pending_reviews;
        self.committed_reviews += committed as u64;
        self.commits += 1;
        tracing::debug!(
            "Checkpoint: committed {} reviews ({} pages) for run {}",
            committed,
            self.pending.len(),
            self.run_id
        );

        self.pending.clear();
        self.pending_reviews = 0;
        Ok(committed)
    }

    /// Records a failed page immediately
    pub fn record_error(&mut self, url: &str, message: &str) -> CheckpointResult<()> {
        self.store.record_error(self.run_id, url, message)
    }

    pub fn pending_reviews(&self) -> usize {
        self.pending_reviews
    }

    pub fn committed_reviews(&self) -> u64 {
        self.committed_reviews
    }

    /// Flushes what is left and returns the number of commits made
    pub fn finish(mut self) -> CheckpointResult<u64> {
        self.flush()?;
        Ok(self.commits)
    }
}
