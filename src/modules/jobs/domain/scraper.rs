/// Port for the external scrape routine
///
/// Fetching and parsing a game's details lives outside the queue; the worker
/// only needs to know whether it succeeded. `Ok(false)`, any `Err` and a panic
/// inside the future all count as a failed attempt.
use crate::shared::errors::AppResult;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameScraper: Send + Sync {
    /// Scrape and store details for one game
    async fn scrape(&self, game_id: &str) -> AppResult<bool>;
}
