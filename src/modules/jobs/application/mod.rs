pub mod service;

pub use service::{CancelQueueResult, QueueStatus, ResumeReport, ScrapeQueueService};
