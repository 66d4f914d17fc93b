/// Background worker that drains the scrape queue
///
/// One worker per process claims the oldest eligible pending job, runs the
/// scrape, records the outcome and moves on until the queue is drained or a
/// stop is requested. The worker owns the in-memory queue state (running flag,
/// current job, stop flag, active batch); everything durable lives in the
/// job repository.
use crate::modules::jobs::config::QueueConfig;
use crate::modules::jobs::domain::entities::ScrapeJob;
use crate::modules::jobs::domain::repository::JobRepository;
use crate::modules::jobs::domain::retry_policy::{RetryDecision, RetryPolicy};
use crate::modules::jobs::domain::scraper::GameScraper;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::logger::TimedOperation;
use crate::{log_debug, log_error, log_info, log_warn};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// In-memory worker state; lost on restart and rebuilt from the store
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerState {
    pub is_running: bool,
    pub stop_requested: bool,
    pub current_job: Option<ScrapeJob>,
    pub active_batch_id: Option<Uuid>,
}

/// Pause before re-claiming when the store reports a job eligible but the
/// claim came back empty
const RECHECK_DELAY: Duration = Duration::from_millis(10);

enum LoopControl {
    Continue,
    Wait(Duration),
    Exit,
}

pub struct ScrapeWorker {
    job_repository: Arc<dyn JobRepository>,
    scraper: Arc<dyn GameScraper>,
    retry_policy: RetryPolicy,
    courtesy_delay: Duration,
    error_backoff: Duration,
    state: RwLock<WorkerState>,
    wakeup: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScrapeWorker {
    pub fn new(
        job_repository: Arc<dyn JobRepository>,
        scraper: Arc<dyn GameScraper>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            job_repository,
            scraper,
            retry_policy: config.retry_policy(),
            courtesy_delay: config.courtesy_delay,
            error_backoff: config.error_backoff,
            state: RwLock::new(WorkerState::default()),
            wakeup: Notify::new(),
            handle: Mutex::new(None),
        }
    }

    pub async fn snapshot(&self) -> WorkerState {
        self.state.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state.read().await.is_running
    }

    /// Pick the batch a new job joins: the requested one, else the active one,
    /// else a fresh id. An explicit batch becomes the active batch.
    pub async fn assign_batch(&self, requested: Option<Uuid>) -> Uuid {
        let mut state = self.state.write().await;
        let batch_id = requested
            .or(state.active_batch_id)
            .unwrap_or_else(Uuid::new_v4);

        if requested.is_some() || state.active_batch_id.is_none() {
            state.active_batch_id = Some(batch_id);
        }
        batch_id
    }

    /// Start the loop unless one is already running.
    ///
    /// Returns true if a new loop was spawned. A running loop is woken instead
    /// (it may be sleeping out a retry backoff), and a pending stop request is
    /// withdrawn since new work has just been accepted.
    pub async fn ensure_running(self: &Arc<Self>) -> bool {
        let mut state = self.state.write().await;
        if state.is_running {
            if state.stop_requested {
                log_info!("New work queued, withdrawing pending stop request");
                state.stop_requested = false;
            }
            drop(state);
            self.wakeup.notify_one();
            return false;
        }
        state.is_running = true;
        state.stop_requested = false;

        // The handle is stored before the state lock is released so a loop
        // spawned by a later call can never be overwritten by this one.
        // Lock order is state, then handle.
        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move { worker.supervise().await });
        *self.handle.lock().await = Some(handle);
        true
    }

    /// Ask the loop to exit once the in-flight job finishes.
    /// Returns false when no loop is running.
    pub async fn request_stop(&self) -> bool {
        let mut state = self.state.write().await;
        if !state.is_running {
            return false;
        }
        state.stop_requested = true;
        drop(state);

        self.wakeup.notify_one();
        log_info!("Scrape worker stop requested");
        true
    }

    /// Request a stop and wait for the background task to finish
    pub async fn shutdown(&self) {
        self.request_stop().await;

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log_error!("Scrape worker task ended abnormally: {}", e);
            }
        }
    }

    /// Run the loop, clearing the state if it panics so a later enqueue can
    /// start a fresh one
    async fn supervise(self: Arc<Self>) {
        let outcome = AssertUnwindSafe(Arc::clone(&self).run())
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            log_error!(
                "Scrape worker loop panicked: {}",
                panic_message(panic.as_ref())
            );
            *self.state.write().await = WorkerState::default();
        }
    }

    async fn run(self: Arc<Self>) {
        log_info!("Scrape worker started");
        let mut processed = 0usize;

        loop {
            let stop_requested = self.state.read().await.stop_requested;

            if !stop_requested {
                match self.job_repository.dequeue().await {
                    Ok(Some(job)) => {
                        self.process_job(job).await;
                        processed += 1;
                        tokio::time::sleep(self.courtesy_delay).await;
                        continue;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        log_error!("Failed to claim next scrape job: {}", e);
                        self.wait(self.error_backoff).await;
                        continue;
                    }
                }
            }

            match self.settle().await {
                LoopControl::Continue => self.wait(RECHECK_DELAY).await,
                LoopControl::Wait(delay) => {
                    log_debug!("No job eligible yet, waiting {:?}", delay);
                    self.wait(delay).await;
                }
                LoopControl::Exit => break,
            }
        }

        log_info!("Scrape worker stopped after processing {} jobs", processed);
    }

    /// Decide what to do when nothing was claimed.
    ///
    /// Runs under the state write lock so an enqueue racing with the exit
    /// either sees the loop still running (and its job is found here) or sees
    /// it stopped and spawns a new one.
    async fn settle(&self) -> LoopControl {
        let mut state = self.state.write().await;

        if !state.stop_requested {
            match self.job_repository.next_eligible_at().await {
                Ok(Some(at)) => {
                    return match (at - Utc::now()).to_std() {
                        Ok(delay) if !delay.is_zero() => LoopControl::Wait(delay),
                        _ => LoopControl::Continue,
                    };
                }
                Ok(None) => log_info!("Scrape queue drained"),
                Err(e) => {
                    log_error!("Failed to inspect scrape queue: {}", e);
                    return LoopControl::Wait(self.error_backoff);
                }
            }
        }

        *state = WorkerState::default();
        LoopControl::Exit
    }

    /// Sleep for `delay`, waking early on a new enqueue or a stop request
    async fn wait(&self, delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.wakeup.notified() => {}
        }
    }

    async fn process_job(&self, job: ScrapeJob) {
        log_info!(
            "Processing scrape job {} for '{}' ({}), attempt {}/{}",
            job.id,
            job.game_name,
            job.game_id,
            job.attempt_number(),
            job.max_retries + 1
        );

        self.state.write().await.current_job = Some(job.clone());

        let timer = TimedOperation::start(format!("scrape of game {}", job.game_id));
        let recorded = match self.execute_scrape(&job.game_id).await {
            Ok(()) => {
                timer.finish("succeeded");
                log_info!("Job {} completed successfully", job.id);
                self.job_repository.mark_completed(job.id).await
            }
            Err(error) => {
                timer.finish("failed");
                self.record_failure(&job, &error).await
            }
        };

        if let Err(e) = recorded {
            // The row stays `processing`; resume_interrupted_jobs repairs it
            log_error!("Failed to record outcome of job {}: {}", job.id, e);
        }

        self.state.write().await.current_job = None;
    }

    /// Run the scrape, folding `Ok(false)`, errors and panics into one failure message
    async fn execute_scrape(&self, game_id: &str) -> Result<(), String> {
        let attempt = AssertUnwindSafe(async { self.scraper.scrape(game_id).await });

        match attempt.catch_unwind().await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err("Scraper reported failure".to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(panic) => Err(format!("Scraper panicked: {}", panic_message(panic.as_ref()))),
        }
    }

    async fn record_failure(&self, job: &ScrapeJob, error: &str) -> AppResult<()> {
        match self.retry_policy.decide(job.retry_count, job.max_retries) {
            RetryDecision::Retry { retry_count, delay } => {
                log_warn!(
                    "Job {} failed (attempt {}/{}), retrying in {:?}: {}",
                    job.id,
                    job.attempt_number(),
                    job.max_retries + 1,
                    delay,
                    error
                );
                let next_attempt_at = deadline_after(delay).ok_or_else(|| {
                    AppError::InternalError(format!(
                        "Retry delay {:?} for job {} is out of range",
                        delay, job.id
                    ))
                })?;
                let message =
                    RetryPolicy::retry_message(job.attempt_number(), job.max_retries, error);
                self.job_repository
                    .mark_retry(job.id, retry_count, &message, next_attempt_at)
                    .await
            }
            RetryDecision::PermanentFailure => {
                log_error!(
                    "Job {} failed permanently after {} retries: {}",
                    job.id,
                    job.max_retries,
                    error
                );
                let message = RetryPolicy::final_message(job.max_retries, error);
                self.job_repository.mark_failed(job.id, &message).await
            }
        }
    }
}

/// `now + delay`, or None when it falls outside chrono's range
fn deadline_after(delay: Duration) -> Option<DateTime<Utc>> {
    let delay = chrono::Duration::from_std(delay).ok()?;
    Utc::now().checked_add_signed(delay)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
