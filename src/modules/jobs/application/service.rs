use crate::modules::jobs::config::QueueConfig;
use crate::modules::jobs::domain::batch::{BatchStats, BatchTracker};
use crate::modules::jobs::domain::entities::{NewScrapeJob, ScrapeJob, ScrapeSubject};
use crate::modules::jobs::domain::repository::JobRepository;
use crate::modules::jobs::domain::scraper::GameScraper;
use crate::modules::jobs::worker::ScrapeWorker;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::validation::Validator;
use crate::{log_debug, log_info};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Snapshot of the queue for polling clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatus {
    pub is_processing: bool,
    pub stop_requested: bool,
    pub current_job: Option<ScrapeJob>,
    pub pending_count: i64,
    pub processing_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub cancelled_count: i64,
    pub recent_jobs: Vec<ScrapeJob>,
    pub current_batch: Option<BatchStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelQueueResult {
    pub cancelled_count: usize,
    /// A worker was running and will exit after its in-flight job
    pub stopping: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReport {
    pub reset_count: usize,
    pub worker_started: bool,
    pub purged_count: usize,
}

/// Public face of the scrape queue
///
/// Enqueue, status and cancellation only touch the job store plus the
/// worker's in-memory flags, so they are safe to call concurrently from any
/// task. Scrape failures never surface here; store errors do.
pub struct ScrapeQueueService {
    job_repository: Arc<dyn JobRepository>,
    worker: Arc<ScrapeWorker>,
    batches: BatchTracker,
    config: QueueConfig,
}

impl ScrapeQueueService {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        scraper: Arc<dyn GameScraper>,
        config: QueueConfig,
    ) -> AppResult<Self> {
        config.validate()?;

        let worker = Arc::new(ScrapeWorker::new(
            job_repository.clone(),
            scraper,
            &config,
        ));

        Ok(Self {
            batches: BatchTracker::new(job_repository.clone()),
            job_repository,
            worker,
            config,
        })
    }

    /// Queue a scrape for one game.
    ///
    /// If the game already has a pending or processing job, that job is
    /// returned unchanged. Otherwise a new job joins `batch_id`, the active
    /// batch, or a fresh batch, and the worker is started if idle.
    pub async fn enqueue(
        &self,
        subject: ScrapeSubject,
        batch_id: Option<Uuid>,
    ) -> AppResult<ScrapeJob> {
        Validator::validate_game_id(&subject.game_id)?;
        Validator::validate_game_name(&subject.game_name)?;

        if let Some(existing) = self
            .job_repository
            .find_active_by_game(&subject.game_id)
            .await?
        {
            log_debug!(
                "Game {} already queued as job {} ({})",
                subject.game_id,
                existing.id,
                existing.status
            );
            return Ok(existing);
        }

        let batch_id = self.worker.assign_batch(batch_id).await;
        let new_job = NewScrapeJob::new(&subject, self.config.max_retries, Some(batch_id));

        let job = match self.job_repository.insert(new_job).await? {
            Some(job) => job,
            // Lost a race with a concurrent enqueue of the same game
            None => self
                .job_repository
                .find_active_by_game(&subject.game_id)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError(format!(
                        "Job for game {} was rejected as a duplicate but no active job exists",
                        subject.game_id
                    ))
                })?,
        };

        log_info!(
            "Queued scrape job {} for '{}' ({}) in batch {}",
            job.id,
            job.game_name,
            job.game_id,
            batch_id
        );

        if self.worker.ensure_running().await {
            log_info!("Started scrape worker");
        }

        Ok(job)
    }

    /// Queue several games as one batch, in order
    pub async fn enqueue_many(&self, subjects: Vec<ScrapeSubject>) -> AppResult<Vec<ScrapeJob>> {
        let batch_id = Uuid::new_v4();
        let mut jobs = Vec::with_capacity(subjects.len());

        for subject in subjects {
            jobs.push(self.enqueue(subject, Some(batch_id)).await?);
        }

        log_info!("Queued batch {} with {} jobs", batch_id, jobs.len());
        Ok(jobs)
    }

    pub async fn get_queue_status(&self) -> AppResult<QueueStatus> {
        let worker = self.worker.snapshot().await;
        let counts = self.job_repository.count_by_status().await?;
        let recent_jobs = self
            .job_repository
            .get_recent(self.config.recent_jobs_limit)
            .await?;
        let current_batch = self.batches.current_batch(worker.active_batch_id).await?;

        Ok(QueueStatus {
            is_processing: worker.is_running,
            stop_requested: worker.stop_requested,
            current_job: worker.current_job,
            pending_count: counts.pending,
            processing_count: counts.processing,
            completed_count: counts.completed,
            failed_count: counts.failed,
            cancelled_count: counts.cancelled,
            recent_jobs,
            current_batch,
        })
    }

    pub async fn get_job(&self, job_id: Uuid) -> AppResult<Option<ScrapeJob>> {
        self.job_repository.get_by_id(job_id).await
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<BatchStats> {
        self.batches.stats(batch_id).await
    }

    /// Cancel every pending job and ask the worker to stop after the job in flight
    pub async fn cancel_queue(&self) -> AppResult<CancelQueueResult> {
        let cancelled_count = self.job_repository.cancel_all_pending().await?;
        let stopping = self.worker.request_stop().await;

        log_info!(
            "Cancelled {} pending scrape jobs (worker stopping: {})",
            cancelled_count,
            stopping
        );

        Ok(CancelQueueResult {
            cancelled_count,
            stopping,
        })
    }

    /// Cancel one job if it has not started yet
    pub async fn cancel_job(&self, job_id: Uuid) -> AppResult<bool> {
        let cancelled = self.job_repository.cancel_pending_job(job_id).await?;
        if cancelled {
            log_info!("Cancelled scrape job {}", job_id);
        } else {
            log_debug!("Scrape job {} is not pending, nothing to cancel", job_id);
        }
        Ok(cancelled)
    }

    /// Startup recovery: requeue jobs interrupted by a previous crash, restart
    /// the worker if work is pending, then run the retention sweep.
    pub async fn resume_interrupted_jobs(&self) -> AppResult<ResumeReport> {
        let reset_count = self.job_repository.reset_processing().await?;
        if reset_count > 0 {
            log_info!("Reset {} interrupted scrape jobs to pending", reset_count);
        }

        let counts = self.job_repository.count_by_status().await?;
        let worker_started = counts.pending > 0 && self.worker.ensure_running().await;
        if worker_started {
            log_info!("Resuming scrape queue with {} pending jobs", counts.pending);
        }

        let purged_count = self.purge_expired_jobs().await?;

        Ok(ResumeReport {
            reset_count,
            worker_started,
            purged_count,
        })
    }

    /// Delete terminal jobs older than the retention window
    pub async fn purge_expired_jobs(&self) -> AppResult<usize> {
        let cutoff = self
            .config
            .retention()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| {
                AppError::ConfigurationError(format!(
                    "retention of {} days is out of range",
                    self.config.retention_days
                ))
            })?;
        let purged = self.job_repository.delete_terminal_before(cutoff).await?;
        if purged > 0 {
            log_info!(
                "Deleted {} scrape jobs older than {} days",
                purged,
                self.config.retention_days
            );
        }
        Ok(purged)
    }

    /// Stop the worker and wait for it; the in-flight scrape runs to completion
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}
