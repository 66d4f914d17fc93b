/// Value objects for jobs domain
use super::entities::JobStatus;
use serde::{Deserialize, Serialize};

/// Job status enum matching database type
#[derive(
    diesel_derive_enum::DbEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[ExistingTypePath = "crate::schema::sql_types::ScrapeJobStatus"]
#[serde(rename_all = "lowercase")]
pub enum JobStatusDb {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl From<JobStatus> for JobStatusDb {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => JobStatusDb::Pending,
            JobStatus::Processing => JobStatusDb::Processing,
            JobStatus::Completed => JobStatusDb::Completed,
            JobStatus::Failed => JobStatusDb::Failed,
            JobStatus::Cancelled => JobStatusDb::Cancelled,
        }
    }
}

impl From<JobStatusDb> for JobStatus {
    fn from(status: JobStatusDb) -> Self {
        match status {
            JobStatusDb::Pending => JobStatus::Pending,
            JobStatusDb::Processing => JobStatus::Processing,
            JobStatusDb::Completed => JobStatus::Completed,
            JobStatusDb::Failed => JobStatus::Failed,
            JobStatusDb::Cancelled => JobStatus::Cancelled,
        }
    }
}

impl std::fmt::Display for JobStatusDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        JobStatus::from(*self).fmt(f)
    }
}
