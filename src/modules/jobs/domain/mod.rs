pub mod batch;
pub mod entities;
pub mod repository;
pub mod retry_policy;
pub mod scraper;
pub mod value_objects;

pub use batch::{BatchStats, BatchTracker};
pub use entities::{JobStatus, NewScrapeJob, ScrapeJob, ScrapeSubject};
pub use repository::{JobRepository, StatusCounts};
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use scraper::GameScraper;
pub use value_objects::JobStatusDb;
