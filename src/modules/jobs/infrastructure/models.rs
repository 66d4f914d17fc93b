/// Diesel models for the scrape_jobs table
use crate::modules::jobs::domain::entities::{NewScrapeJob, ScrapeJob};
use crate::modules::jobs::domain::value_objects::JobStatusDb;
use crate::schema::scrape_jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

/// Diesel model for inserting new jobs
#[derive(Insertable, Debug)]
#[diesel(table_name = scrape_jobs)]
pub struct NewScrapeJobModel {
    pub id: Uuid,
    pub game_id: String,
    pub game_name: String,
    pub status: JobStatusDb,
    pub created_at: DateTime<Utc>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub batch_id: Option<Uuid>,
}

impl From<NewScrapeJob> for NewScrapeJobModel {
    fn from(job: NewScrapeJob) -> Self {
        Self {
            id: job.id,
            game_id: job.game_id,
            game_name: job.game_name,
            status: JobStatusDb::Pending,
            created_at: job.created_at,
            retry_count: 0,
            max_retries: job.max_retries,
            batch_id: job.batch_id,
        }
    }
}

/// Diesel model for querying existing jobs
#[derive(Queryable, Selectable, QueryableByName, Debug, Clone)]
#[diesel(table_name = scrape_jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ScrapeJobModel {
    pub id: Uuid,
    pub game_id: String,
    pub game_name: String,
    pub status: JobStatusDb,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub batch_id: Option<Uuid>,
}

impl From<ScrapeJobModel> for ScrapeJob {
    fn from(model: ScrapeJobModel) -> Self {
        Self {
            id: model.id,
            game_id: model.game_id,
            game_name: model.game_name,
            status: model.status.into(),
            error: model.error,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
            next_attempt_at: model.next_attempt_at,
            retry_count: model.retry_count,
            max_retries: model.max_retries,
            batch_id: model.batch_id,
        }
    }
}
