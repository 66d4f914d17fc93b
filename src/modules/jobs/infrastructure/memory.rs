/// In-process implementation of JobRepository
///
/// Holds rows in insertion order behind a single lock, so every operation is
/// atomic and `created_at` ties are broken by insertion order. Rows do not
/// survive the process; use it when no database is configured and in tests.
use crate::modules::jobs::domain::entities::{JobStatus, NewScrapeJob, ScrapeJob};
use crate::modules::jobs::domain::repository::{JobRepository, StatusCounts};
use crate::shared::errors::AppResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<Vec<ScrapeJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row exactly as given, bypassing enqueue rules
    pub async fn seed(&self, job: ScrapeJob) {
        self.jobs.write().await.push(job);
    }

    /// Copy of every stored row in insertion order
    pub async fn all_jobs(&self) -> Vec<ScrapeJob> {
        self.jobs.read().await.clone()
    }

    fn update_where<F, U>(jobs: &mut [ScrapeJob], filter: F, mut apply: U) -> usize
    where
        F: Fn(&ScrapeJob) -> bool,
        U: FnMut(&mut ScrapeJob),
    {
        let mut updated = 0;
        for job in jobs.iter_mut().filter(|job| filter(job)) {
            apply(job);
            updated += 1;
        }
        updated
    }

    fn update_one<U>(jobs: &mut [ScrapeJob], job_id: Uuid, apply: U)
    where
        U: FnOnce(&mut ScrapeJob),
    {
        if let Some(job) = jobs.iter_mut().find(|job| job.id == job_id) {
            apply(job);
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn insert(&self, job: NewScrapeJob) -> AppResult<Option<ScrapeJob>> {
        let mut jobs = self.jobs.write().await;

        let duplicate = jobs
            .iter()
            .any(|existing| existing.game_id == job.game_id && existing.status.is_active());
        if duplicate {
            return Ok(None);
        }

        let record = ScrapeJob::from(job);
        jobs.push(record.clone());
        Ok(Some(record))
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ScrapeJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().find(|job| job.id == job_id).cloned())
    }

    async fn find_active_by_game(&self, game_id: &str) -> AppResult<Option<ScrapeJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .iter()
            .rev()
            .find(|job| job.game_id == game_id && job.status.is_active())
            .cloned())
    }

    async fn dequeue(&self) -> AppResult<Option<ScrapeJob>> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();

        let next = jobs
            .iter_mut()
            .filter(|job| job.is_eligible_at(now))
            .min_by_key(|job| job.created_at);

        Ok(next.map(|job| {
            job.status = JobStatus::Processing;
            job.started_at = Some(now);
            job.clone()
        }))
    }

    async fn mark_completed(&self, job_id: Uuid) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        Self::update_one(&mut jobs, job_id, |job| {
            job.status = JobStatus::Completed;
            job.completed_at = Some(Utc::now());
            job.error = None;
            job.next_attempt_at = None;
        });
        Ok(())
    }

    async fn mark_retry(
        &self,
        job_id: Uuid,
        retry_count: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        Self::update_one(&mut jobs, job_id, |job| {
            job.status = JobStatus::Pending;
            job.retry_count = retry_count;
            job.error = Some(error.to_string());
            job.started_at = None;
            job.next_attempt_at = Some(next_attempt_at);
        });
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        Self::update_one(&mut jobs, job_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
            job.completed_at = Some(Utc::now());
            job.next_attempt_at = None;
        });
        Ok(())
    }

    async fn cancel_pending_job(&self, job_id: Uuid) -> AppResult<bool> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        let cancelled = Self::update_where(
            &mut jobs,
            |job| job.id == job_id && job.status == JobStatus::Pending,
            |job| {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(now);
                job.next_attempt_at = None;
            },
        );
        Ok(cancelled == 1)
    }

    async fn cancel_all_pending(&self) -> AppResult<usize> {
        let mut jobs = self.jobs.write().await;
        let now = Utc::now();
        Ok(Self::update_where(
            &mut jobs,
            |job| job.status == JobStatus::Pending,
            |job| {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(now);
                job.next_attempt_at = None;
            },
        ))
    }

    async fn reset_processing(&self) -> AppResult<usize> {
        let mut jobs = self.jobs.write().await;
        Ok(Self::update_where(
            &mut jobs,
            |job| job.status == JobStatus::Processing,
            |job| {
                job.status = JobStatus::Pending;
                job.started_at = None;
            },
        ))
    }

    async fn count_by_status(&self) -> AppResult<StatusCounts> {
        let jobs = self.jobs.read().await;
        Ok(StatusCounts::from_pairs(jobs.iter().map(|job| (job.status, 1))))
    }

    async fn get_recent(&self, limit: usize) -> AppResult<Vec<ScrapeJob>> {
        let jobs = self.jobs.read().await;
        let mut ordered: Vec<(usize, &ScrapeJob)> = jobs.iter().enumerate().collect();
        ordered.sort_by_key(|(position, job)| Reverse((job.created_at, *position)));

        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|(_, job)| job.clone())
            .collect())
    }

    async fn batch_status_counts(&self, batch_id: Uuid) -> AppResult<StatusCounts> {
        let jobs = self.jobs.read().await;
        Ok(StatusCounts::from_pairs(
            jobs.iter()
                .filter(|job| job.batch_id == Some(batch_id))
                .map(|job| (job.status, 1)),
        ))
    }

    async fn latest_active_batch(&self) -> AppResult<Option<Uuid>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| job.status.is_active() && job.batch_id.is_some())
            .max_by_key(|(position, job)| (job.created_at, *position))
            .and_then(|(_, job)| job.batch_id))
    }

    async fn next_eligible_at(&self) -> AppResult<Option<DateTime<Utc>>> {
        let jobs = self.jobs.read().await;
        let pending = jobs.iter().filter(|job| job.status == JobStatus::Pending);

        let ready = pending
            .clone()
            .filter(|job| job.next_attempt_at.is_none())
            .map(|job| job.created_at)
            .min();
        if ready.is_some() {
            return Ok(ready);
        }

        Ok(pending.filter_map(|job| job.next_attempt_at).min())
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|job| {
            !(job.status.is_terminal() && job.completed_at.map_or(false, |at| at < cutoff))
        });
        Ok(before - jobs.len())
    }
}
