pub mod modules;
mod schema;
pub mod shared;

use modules::jobs::{
    application::ScrapeQueueService, config::QueueConfig, domain::scraper::GameScraper,
    infrastructure::JobRepositoryImpl,
};
use shared::errors::AppResult;
use shared::utils::logger::init_logger;
use shared::Database;
use std::sync::Arc;

/// Wire the scrape queue against PostgreSQL and recover from the last run.
///
/// Reads `DATABASE_URL`, applies pending migrations, then resets interrupted
/// jobs and restarts the worker if anything is still pending.
pub async fn bootstrap(
    config: QueueConfig,
    scraper: Arc<dyn GameScraper>,
) -> AppResult<Arc<ScrapeQueueService>> {
    dotenvy::dotenv().ok();
    init_logger();
    config.validate()?;

    let database = Database::new()?;
    let applied = database.run_migrations()?;
    if applied > 0 {
        log_info!("Applied {} database migrations", applied);
    }

    let job_repository = Arc::new(JobRepositoryImpl::new(database.pool().clone()));
    let service = Arc::new(ScrapeQueueService::new(job_repository, scraper, config)?);

    let report = service.resume_interrupted_jobs().await?;
    log_info!(
        "Scrape queue ready (reset: {}, worker started: {}, purged: {})",
        report.reset_count,
        report.worker_started,
        report.purged_count
    );

    Ok(service)
}
