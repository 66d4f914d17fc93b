/// Queue builders and polling helpers
use super::fakes::ScriptedScraper;
use boardshelf_lib::modules::jobs::{
    InMemoryJobRepository, QueueConfig, QueueStatus, ScrapeQueueService, ScrapeSubject,
};
use std::sync::Arc;
use std::time::Duration;

pub struct TestQueue {
    pub service: ScrapeQueueService,
    pub repository: Arc<InMemoryJobRepository>,
    pub scraper: Arc<ScriptedScraper>,
}

/// Millisecond delays so retries and courtesy pauses do not slow the suite
pub fn fast_config(max_retries: i32) -> QueueConfig {
    QueueConfig {
        max_retries,
        retry_base_delay: Duration::from_millis(5),
        retry_max_delay: Duration::from_millis(40),
        courtesy_delay: Duration::from_millis(1),
        error_backoff: Duration::from_millis(10),
        ..Default::default()
    }
}

pub fn build_queue(scraper: ScriptedScraper, config: QueueConfig) -> TestQueue {
    build_queue_with_repository(Arc::new(InMemoryJobRepository::new()), scraper, config)
}

pub fn build_queue_with_repository(
    repository: Arc<InMemoryJobRepository>,
    scraper: ScriptedScraper,
    config: QueueConfig,
) -> TestQueue {
    let scraper = Arc::new(scraper);
    let service = ScrapeQueueService::new(repository.clone(), scraper.clone(), config)
        .expect("test config is valid");

    TestQueue {
        service,
        repository,
        scraper,
    }
}

pub fn subject(game_id: &str, game_name: &str) -> ScrapeSubject {
    ScrapeSubject::new(game_id, game_name)
}

/// Poll the queue status until `predicate` holds, panicking after five seconds
pub async fn wait_for<F>(service: &ScrapeQueueService, predicate: F) -> QueueStatus
where
    F: Fn(&QueueStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = service
                .get_queue_status()
                .await
                .expect("status query failed");
            if predicate(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("queue never reached the expected state")
}

pub async fn wait_for_idle(service: &ScrapeQueueService) -> QueueStatus {
    wait_for(service, |status| !status.is_processing).await
}
