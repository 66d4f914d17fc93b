/// Scripted scraper doubles for queue tests
use async_trait::async_trait;
use boardshelf_lib::modules::jobs::GameScraper;
use boardshelf_lib::shared::errors::{AppError, AppResult};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// What one scrape call does
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    /// The scraper returns `Ok(false)`
    Reject,
    /// The scraper returns an error with this message
    Fail(&'static str),
}

/// Holds a scrape in flight until released
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Records every call and plays back a per-game script.
///
/// Games without a script (or whose script ran out) fall back to the default
/// outcome.
pub struct ScriptedScraper {
    default: Outcome,
    scripts: Mutex<HashMap<String, VecDeque<Outcome>>>,
    gates: HashMap<String, Gate>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedScraper {
    pub fn succeeding() -> Self {
        Self::with_default(Outcome::Succeed)
    }

    pub fn failing(message: &'static str) -> Self {
        Self::with_default(Outcome::Fail(message))
    }

    pub fn with_default(default: Outcome) -> Self {
        Self {
            default,
            scripts: Mutex::new(HashMap::new()),
            gates: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, game_id: &str, outcomes: Vec<Outcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(game_id.to_string(), outcomes.into());
        self
    }

    /// Every scrape of `game_id` waits for one release of `gate`
    pub fn gated(mut self, game_id: &str, gate: &Gate) -> Self {
        self.gates.insert(game_id.to_string(), gate.clone());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, game_id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|id| id.as_str() == game_id)
            .count()
    }

    fn next_outcome(&self, game_id: &str) -> Outcome {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(game_id)
            .and_then(|script| script.pop_front())
            .unwrap_or_else(|| self.default.clone())
    }
}

#[async_trait]
impl GameScraper for ScriptedScraper {
    async fn scrape(&self, game_id: &str) -> AppResult<bool> {
        self.calls.lock().unwrap().push(game_id.to_string());

        if let Some(gate) = self.gates.get(game_id) {
            gate.pass().await;
        }

        match self.next_outcome(game_id) {
            Outcome::Succeed => Ok(true),
            Outcome::Reject => Ok(false),
            Outcome::Fail(message) => Err(AppError::ExternalServiceError(message.to_string())),
        }
    }
}
