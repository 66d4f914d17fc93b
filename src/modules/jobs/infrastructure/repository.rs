/// Diesel-based implementation of JobRepository
///
/// Uses PostgreSQL with SELECT FOR UPDATE SKIP LOCKED for atomic job claiming.
/// The one-active-job-per-game rule is backed by the partial unique index
/// `uq_scrape_jobs_active_game`, so a racing duplicate insert is dropped by
/// ON CONFLICT DO NOTHING.
use crate::modules::jobs::domain::entities::{JobStatus, NewScrapeJob, ScrapeJob};
use crate::modules::jobs::domain::repository::{JobRepository, StatusCounts};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::modules::jobs::infrastructure::models::{NewScrapeJobModel, ScrapeJobModel};
use crate::schema::scrape_jobs;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::infrastructure::database::{DbConnection, DbPool};
use crate::shared::utils::logger::LogContext;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::{count, min};
use diesel::prelude::*;
use diesel::sql_types::Timestamptz;
use uuid::Uuid;

const ACTIVE: [JobStatusDb; 2] = [JobStatusDb::Pending, JobStatusDb::Processing];
const TERMINAL: [JobStatusDb; 3] = [
    JobStatusDb::Completed,
    JobStatusDb::Failed,
    JobStatusDb::Cancelled,
];

pub struct JobRepositoryImpl {
    pool: DbPool,
}

impl JobRepositoryImpl {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get database connection from pool
    fn get_conn(&self) -> AppResult<DbConnection> {
        self.pool
            .get()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get connection: {}", e)))
    }

    fn load_counts(rows: Vec<(JobStatusDb, i64)>) -> StatusCounts {
        StatusCounts::from_pairs(
            rows.into_iter()
                .map(|(status, n)| (JobStatus::from(status), n)),
        )
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn insert(&self, job: NewScrapeJob) -> AppResult<Option<ScrapeJob>> {
        let new_job = NewScrapeJobModel::from(job);
        let mut conn = self.get_conn()?;

        let inserted: Option<ScrapeJobModel> = diesel::insert_into(scrape_jobs::table)
            .values(&new_job)
            .on_conflict_do_nothing()
            .returning(ScrapeJobModel::as_returning())
            .get_result(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to enqueue job: {}", e)))?;

        Ok(inserted.map(ScrapeJob::from))
    }

    async fn get_by_id(&self, job_id: Uuid) -> AppResult<Option<ScrapeJob>> {
        let mut conn = self.get_conn()?;

        let job: Option<ScrapeJobModel> = scrape_jobs::table
            .find(job_id)
            .select(ScrapeJobModel::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to get job by id: {}", e)))?;

        Ok(job.map(ScrapeJob::from))
    }

    async fn find_active_by_game(&self, game_id: &str) -> AppResult<Option<ScrapeJob>> {
        let mut conn = self.get_conn()?;

        let job: Option<ScrapeJobModel> = scrape_jobs::table
            .filter(scrape_jobs::game_id.eq(game_id))
            .filter(scrape_jobs::status.eq_any(ACTIVE.to_vec()))
            .order(scrape_jobs::created_at.desc())
            .select(ScrapeJobModel::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to look up active job: {}", e))
            })?;

        Ok(job.map(ScrapeJob::from))
    }

    async fn dequeue(&self) -> AppResult<Option<ScrapeJob>> {
        let mut conn = self.get_conn()?;

        // Atomic claim using SELECT FOR UPDATE SKIP LOCKED; jobs still in
        // retry backoff are skipped. Eligibility is judged on the same clock
        // that wrote next_attempt_at and that next_eligible_at is compared to.
        let result: Option<ScrapeJobModel> = diesel::sql_query(
            r#"
            UPDATE scrape_jobs
            SET status = 'processing',
                started_at = $1
            WHERE id = (
                SELECT id
                FROM scrape_jobs
                WHERE status = 'pending'
                  AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, game_id, game_name, status, error,
                      created_at, started_at, completed_at, next_attempt_at,
                      retry_count, max_retries, batch_id
            "#,
        )
        .bind::<Timestamptz, _>(Utc::now())
        .get_result(&mut conn)
        .optional()
        .map_err(|e| AppError::DatabaseError(format!("Failed to dequeue job: {}", e)))?;

        Ok(result.map(ScrapeJob::from))
    }

    async fn mark_completed(&self, job_id: Uuid) -> AppResult<()> {
        let mut conn = self.get_conn()?;

        diesel::update(scrape_jobs::table.find(job_id))
            .set((
                scrape_jobs::status.eq(JobStatusDb::Completed),
                scrape_jobs::completed_at.eq(Some(Utc::now())),
                scrape_jobs::error.eq(None::<String>),
                scrape_jobs::next_attempt_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to mark job as completed: {}", e))
            })?;

        Ok(())
    }

    async fn mark_retry(
        &self,
        job_id: Uuid,
        retry_count: i32,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.get_conn()?;

        diesel::update(scrape_jobs::table.find(job_id))
            .set((
                scrape_jobs::status.eq(JobStatusDb::Pending),
                scrape_jobs::retry_count.eq(retry_count),
                scrape_jobs::error.eq(Some(error)),
                scrape_jobs::started_at.eq(None::<DateTime<Utc>>),
                scrape_jobs::next_attempt_at.eq(Some(next_attempt_at)),
            ))
            .execute(&mut conn)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to schedule job retry: {}", e))
            })?;

        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, error: &str) -> AppResult<()> {
        let mut conn = self.get_conn()?;

        diesel::update(scrape_jobs::table.find(job_id))
            .set((
                scrape_jobs::status.eq(JobStatusDb::Failed),
                scrape_jobs::error.eq(Some(error)),
                scrape_jobs::completed_at.eq(Some(Utc::now())),
                scrape_jobs::next_attempt_at.eq(None::<DateTime<Utc>>),
            ))
            .execute(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to mark job as failed: {}", e)))?;

        Ok(())
    }

    async fn cancel_pending_job(&self, job_id: Uuid) -> AppResult<bool> {
        let mut conn = self.get_conn()?;

        let updated = diesel::update(
            scrape_jobs::table
                .filter(scrape_jobs::id.eq(job_id))
                .filter(scrape_jobs::status.eq(JobStatusDb::Pending)),
        )
        .set((
            scrape_jobs::status.eq(JobStatusDb::Cancelled),
            scrape_jobs::completed_at.eq(Some(Utc::now())),
            scrape_jobs::next_attempt_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to cancel job: {}", e)))?;

        Ok(updated == 1)
    }

    async fn cancel_all_pending(&self) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let cancelled = diesel::update(
            scrape_jobs::table.filter(scrape_jobs::status.eq(JobStatusDb::Pending)),
        )
        .set((
            scrape_jobs::status.eq(JobStatusDb::Cancelled),
            scrape_jobs::completed_at.eq(Some(Utc::now())),
            scrape_jobs::next_attempt_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to cancel pending jobs: {}", e)))?;

        LogContext::db_operation("cancel pending", "scrape_jobs", Some(cancelled));
        Ok(cancelled)
    }

    async fn reset_processing(&self) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let reset = diesel::update(
            scrape_jobs::table.filter(scrape_jobs::status.eq(JobStatusDb::Processing)),
        )
        .set((
            scrape_jobs::status.eq(JobStatusDb::Pending),
            scrape_jobs::started_at.eq(None::<DateTime<Utc>>),
        ))
        .execute(&mut conn)
        .map_err(|e| {
            AppError::DatabaseError(format!("Failed to reset interrupted jobs: {}", e))
        })?;

        LogContext::db_operation("reset processing", "scrape_jobs", Some(reset));
        Ok(reset)
    }

    async fn count_by_status(&self) -> AppResult<StatusCounts> {
        let mut conn = self.get_conn()?;

        let rows: Vec<(JobStatusDb, i64)> = scrape_jobs::table
            .group_by(scrape_jobs::status)
            .select((scrape_jobs::status, count(scrape_jobs::id)))
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to count jobs: {}", e)))?;

        Ok(Self::load_counts(rows))
    }

    async fn get_recent(&self, limit: usize) -> AppResult<Vec<ScrapeJob>> {
        let mut conn = self.get_conn()?;

        let jobs: Vec<ScrapeJobModel> = scrape_jobs::table
            .order(scrape_jobs::created_at.desc())
            .limit(limit as i64)
            .select(ScrapeJobModel::as_select())
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to get recent jobs: {}", e)))?;

        Ok(jobs.into_iter().map(ScrapeJob::from).collect())
    }

    async fn batch_status_counts(&self, batch_id: Uuid) -> AppResult<StatusCounts> {
        let mut conn = self.get_conn()?;

        let rows: Vec<(JobStatusDb, i64)> = scrape_jobs::table
            .filter(scrape_jobs::batch_id.eq(Some(batch_id)))
            .group_by(scrape_jobs::status)
            .select((scrape_jobs::status, count(scrape_jobs::id)))
            .load(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to count batch jobs: {}", e)))?;

        Ok(Self::load_counts(rows))
    }

    async fn latest_active_batch(&self) -> AppResult<Option<Uuid>> {
        let mut conn = self.get_conn()?;

        let batch: Option<Option<Uuid>> = scrape_jobs::table
            .filter(scrape_jobs::status.eq_any(ACTIVE.to_vec()))
            .filter(scrape_jobs::batch_id.is_not_null())
            .order(scrape_jobs::created_at.desc())
            .select(scrape_jobs::batch_id)
            .first(&mut conn)
            .optional()
            .map_err(|e| AppError::DatabaseError(format!("Failed to find active batch: {}", e)))?;

        Ok(batch.flatten())
    }

    async fn next_eligible_at(&self) -> AppResult<Option<DateTime<Utc>>> {
        let mut conn = self.get_conn()?;

        // Pending jobs without a backoff are claimable right away
        let ready: Option<DateTime<Utc>> = scrape_jobs::table
            .filter(scrape_jobs::status.eq(JobStatusDb::Pending))
            .filter(scrape_jobs::next_attempt_at.is_null())
            .select(min(scrape_jobs::created_at))
            .get_result(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to inspect queue: {}", e)))?;

        if ready.is_some() {
            return Ok(ready);
        }

        let scheduled: Option<DateTime<Utc>> = scrape_jobs::table
            .filter(scrape_jobs::status.eq(JobStatusDb::Pending))
            .select(min(scrape_jobs::next_attempt_at))
            .get_result(&mut conn)
            .map_err(|e| AppError::DatabaseError(format!("Failed to inspect queue: {}", e)))?;

        Ok(scheduled)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<usize> {
        let mut conn = self.get_conn()?;

        let deleted = diesel::delete(
            scrape_jobs::table
                .filter(scrape_jobs::status.eq_any(TERMINAL.to_vec()))
                .filter(scrape_jobs::completed_at.lt(Some(cutoff))),
        )
        .execute(&mut conn)
        .map_err(|e| AppError::DatabaseError(format!("Failed to delete old jobs: {}", e)))?;

        LogContext::db_operation("retention sweep", "scrape_jobs", Some(deleted));
        Ok(deleted)
    }
}
