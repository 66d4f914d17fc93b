/// Domain entities for the scrape job queue
///
/// A job is one unit of scrape work for a single board game. Rows are created
/// by the queue service, mutated by the worker loop (claim, completion, retry,
/// failure) or by cancellation, and removed by the retention sweep.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job status; `completed`, `failed` and `cancelled` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const TERMINAL: [JobStatus; 3] = [
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Queued or in flight
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// The external game a job scrapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeSubject {
    pub game_id: String,
    pub game_name: String,
}

impl ScrapeSubject {
    pub fn new(game_id: impl Into<String>, game_name: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            game_name: game_name.into(),
        }
    }
}

/// New job to be queued (before insertion into the store)
#[derive(Debug, Clone)]
pub struct NewScrapeJob {
    pub id: Uuid,
    pub game_id: String,
    pub game_name: String,
    pub max_retries: i32,
    pub batch_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl NewScrapeJob {
    pub fn new(subject: &ScrapeSubject, max_retries: i32, batch_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id: subject.game_id.clone(),
            game_name: subject.game_name.clone(),
            max_retries,
            batch_id,
            created_at: Utc::now(),
        }
    }
}

/// Job row as stored, with lifecycle metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub id: Uuid,
    pub game_id: String,
    pub game_name: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Earliest time a retried job may be claimed again
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub batch_id: Option<Uuid>,
}

impl ScrapeJob {
    /// 1-based number of the attempt currently (or next) executing
    pub fn attempt_number(&self) -> i32 {
        self.retry_count + 1
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending and past any retry backoff
    pub fn is_eligible_at(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.next_attempt_at.map_or(true, |at| at <= now)
    }
}

impl From<NewScrapeJob> for ScrapeJob {
    fn from(new: NewScrapeJob) -> Self {
        Self {
            id: new.id,
            game_id: new.game_id,
            game_name: new.game_name,
            status: JobStatus::Pending,
            error: None,
            created_at: new.created_at,
            started_at: None,
            completed_at: None,
            next_attempt_at: None,
            retry_count: 0,
            max_retries: new.max_retries,
            batch_id: new.batch_id,
        }
    }
}
