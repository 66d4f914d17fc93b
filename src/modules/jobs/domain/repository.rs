/// Repository trait for scrape job persistence
///
/// The store is the single source of truth for job existence and status.
/// Every method is atomic at the single-row or filtered-bulk level; the queue
/// never needs a cross-row transaction.
use crate::modules::jobs::domain::entities::{JobStatus, NewScrapeJob, ScrapeJob};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new pending job.
    /// Returns None when a pending or processing job already exists for the game.
    async fn insert(&self, job: NewScrapeJob) -> AppResult<Option<ScrapeJob>>;

    /// Get job by ID
    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ScrapeJob>>;

    /// The pending or processing job for a game, if any
    async fn find_active_by_game(&self, game_id: &str) -> AppResult<Option<ScrapeJob>>;

    /// Claim the oldest eligible pending job (FIFO by created_at), marking it
    /// processing and stamping started_at. Returns None if nothing is eligible.
    async fn dequeue(&self) -> AppResult<Option<ScrapeJob>>;

    /// Mark job as completed and clear its error
    async fn mark_completed(&self, job_id: Uuid) -> AppResult<()>;

    /// Return a failed job to pending with an incremented retry count
    async fn mark_retry(
        &self,
        job_id: Uuid,
        retry_count: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Mark job as permanently failed
    async fn mark_failed(&self, job_id: Uuid, error: &str) -> AppResult<()>;

    /// Cancel a job only if it is still pending. Returns whether it was cancelled.
    async fn cancel_pending_job(&self, job_id: Uuid) -> AppResult<bool>;

    /// Cancel every pending job, returning how many were cancelled
    async fn cancel_all_pending(&self) -> AppResult<usize>;

    /// Return every processing job to pending, clearing started_at
    async fn reset_processing(&self) -> AppResult<usize>;

    /// Count jobs by status
    async fn count_by_status(&self) -> AppResult<StatusCounts>;

    /// Most recently created jobs, newest first
    async fn get_recent(&self, limit: usize) -> AppResult<Vec<ScrapeJob>>;

    /// Count jobs by status within one batch
    async fn batch_status_counts(&self, batch_id: Uuid) -> AppResult<StatusCounts>;

    /// Batch of the newest pending or processing job that has one
    async fn latest_active_batch(&self) -> AppResult<Option<Uuid>>;

    /// Earliest moment any pending job becomes claimable, or None if no job is pending
    async fn next_eligible_at(&self) -> AppResult<Option<DateTime<Utc>>>;

    /// Delete terminal jobs that finished before the cutoff
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize>;
}

/// Per-status job counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
}

impl StatusCounts {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (JobStatus, i64)>,
    {
        let mut counts = Self::default();
        for (status, count) in pairs {
            counts.add(status, count);
        }
        counts
    }

    pub fn add(&mut self, status: JobStatus, count: i64) {
        match status {
            JobStatus::Pending => self.pending += count,
            JobStatus::Processing => self.processing += count,
            JobStatus::Completed => self.completed += count,
            JobStatus::Failed => self.failed += count,
            JobStatus::Cancelled => self.cancelled += count,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.processing + self.completed + self.failed + self.cancelled
    }

    /// Any job still queued or running
    pub fn has_active(&self) -> bool {
        self.pending + self.processing > 0
    }
}
