/// Persistent scrape job queue
///
/// Serializes long-running, rate-limited game scrapes behind a single
/// background worker, with retry/backoff, batch progress and recovery across
/// restarts.
///
/// Architecture:
/// - Domain: entities, retry policy, batch tracking, repository and scraper ports
/// - Infrastructure: Diesel (PostgreSQL) and in-memory repositories
/// - Worker: the background loop that claims and runs jobs
/// - Application: the queue service callers talk to
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod worker;

// Re-exports for easy access
pub use application::{CancelQueueResult, QueueStatus, ResumeReport, ScrapeQueueService};
pub use config::QueueConfig;
pub use domain::{
    batch::{BatchStats, BatchTracker},
    entities::{JobStatus, NewScrapeJob, ScrapeJob, ScrapeSubject},
    repository::{JobRepository, StatusCounts},
    retry_policy::{RetryDecision, RetryPolicy},
    scraper::GameScraper,
};
pub use infrastructure::{InMemoryJobRepository, JobRepositoryImpl};
pub use worker::{ScrapeWorker, WorkerState};
