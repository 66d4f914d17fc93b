/// Batch progress derived from the job store
///
/// A batch is a set of jobs enqueued together under one `batch_id`. There is
/// no batch table; progress is computed from a group-by over the jobs.
use crate::modules::jobs::domain::repository::{JobRepository, StatusCounts};
use crate::shared::errors::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Aggregate progress for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub batch_id: Uuid,
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub pending: i64,
    pub processing: i64,
    pub cancelled: i64,
}

impl BatchStats {
    pub fn from_counts(batch_id: Uuid, counts: StatusCounts) -> Self {
        Self {
            batch_id,
            total: counts.total(),
            completed: counts.completed,
            failed: counts.failed,
            pending: counts.pending,
            processing: counts.processing,
            cancelled: counts.cancelled,
        }
    }
}

/// Read-only view over batch progress
pub struct BatchTracker {
    repository: Arc<dyn JobRepository>,
}

impl BatchTracker {
    pub fn new(repository: Arc<dyn JobRepository>) -> Self {
        Self { repository }
    }

    pub async fn stats(&self, batch_id: Uuid) -> AppResult<BatchStats> {
        let counts = self.repository.batch_status_counts(batch_id).await?;
        Ok(BatchStats::from_counts(batch_id, counts))
    }

    /// Stats for the batch currently in progress.
    ///
    /// `tracked` is the batch the running worker was fed; it is reported even
    /// in the gap between its last job finishing and the worker going idle.
    /// Without one, the newest batch that still has queued or running jobs is
    /// reported.
    pub async fn current_batch(&self, tracked: Option<Uuid>) -> AppResult<Option<BatchStats>> {
        if let Some(batch_id) = tracked {
            let stats = self.stats(batch_id).await?;
            if stats.total > 0 {
                return Ok(Some(stats));
            }
        }

        let Some(batch_id) = self.repository.latest_active_batch().await? else {
            return Ok(None);
        };

        // The batch may have drained between the two reads
        let counts = self.repository.batch_status_counts(batch_id).await?;
        Ok(counts
            .has_active()
            .then(|| BatchStats::from_counts(batch_id, counts)))
    }
}
