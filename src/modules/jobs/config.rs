/// Queue tuning knobs
///
/// Defaults suit a rate-limited public game database. Every value can be
/// overridden from the environment (a `.env` file is loaded first).
use crate::modules::jobs::domain::retry_policy::RetryPolicy;
use crate::shared::errors::{AppError, AppResult};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: i32 = 3;
pub const DEFAULT_RECENT_JOBS_LIMIT: usize = 20;
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Upper bounds keep every derived timestamp well inside chrono's range
pub const MAX_RETRIES_LIMIT: i32 = 100;
pub const MAX_RETENTION_DAYS: i64 = 36_500;
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Retries allowed per job after the first attempt
    pub max_retries: i32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Pause between jobs, a courtesy to the external source
    pub courtesy_delay: Duration,
    /// Pause after the store itself errors inside the worker loop
    pub error_backoff: Duration,
    /// Jobs listed in a status snapshot
    pub recent_jobs_limit: usize,
    /// Terminal jobs older than this are deleted by the retention sweep
    pub retention_days: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(120),
            courtesy_delay: Duration::from_millis(500),
            error_backoff: Duration::from_secs(5),
            recent_jobs_limit: DEFAULT_RECENT_JOBS_LIMIT,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl QueueConfig {
    /// Defaults overridden by `SCRAPE_QUEUE_*` environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            max_retries: read_var("SCRAPE_QUEUE_MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            retry_base_delay: read_millis("SCRAPE_QUEUE_RETRY_BASE_DELAY_MS")?
                .unwrap_or(defaults.retry_base_delay),
            retry_max_delay: read_millis("SCRAPE_QUEUE_RETRY_MAX_DELAY_MS")?
                .unwrap_or(defaults.retry_max_delay),
            courtesy_delay: read_millis("SCRAPE_QUEUE_COURTESY_DELAY_MS")?
                .unwrap_or(defaults.courtesy_delay),
            error_backoff: defaults.error_backoff,
            recent_jobs_limit: read_var("SCRAPE_QUEUE_RECENT_JOBS_LIMIT")?
                .unwrap_or(defaults.recent_jobs_limit),
            retention_days: read_var("SCRAPE_QUEUE_RETENTION_DAYS")?
                .unwrap_or(defaults.retention_days),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.max_retries < 0 {
            return Err(AppError::ConfigurationError(
                "max_retries cannot be negative".to_string(),
            ));
        }
        if self.recent_jobs_limit == 0 {
            return Err(AppError::ConfigurationError(
                "recent_jobs_limit must be at least 1".to_string(),
            ));
        }
        if self.retention_days <= 0 {
            return Err(AppError::ConfigurationError(
                "retention_days must be at least 1".to_string(),
            ));
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(AppError::ConfigurationError(format!(
                "max_retries cannot exceed {}",
                MAX_RETRIES_LIMIT
            )));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(AppError::ConfigurationError(format!(
                "retention_days cannot exceed {}",
                MAX_RETENTION_DAYS
            )));
        }
        for (name, delay) in [
            ("retry_base_delay", self.retry_base_delay),
            ("retry_max_delay", self.retry_max_delay),
            ("courtesy_delay", self.courtesy_delay),
            ("error_backoff", self.error_backoff),
        ] {
            if delay > MAX_DELAY {
                return Err(AppError::ConfigurationError(format!(
                    "{} ({:?}) exceeds the {:?} limit",
                    name, delay, MAX_DELAY
                )));
            }
        }
        if self.retry_max_delay < self.retry_base_delay {
            return Err(AppError::ConfigurationError(format!(
                "retry_max_delay ({:?}) is shorter than retry_base_delay ({:?})",
                self.retry_max_delay, self.retry_base_delay
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_base_delay, self.retry_max_delay)
    }

    /// None when `retention_days` does not fit in a chrono duration
    pub fn retention(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_days(self.retention_days)
    }
}

fn read_var<T: FromStr>(name: &str) -> AppResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            AppError::ConfigurationError(format!("{} has an invalid value: '{}'", name, raw))
        }),
        Err(_) => Ok(None),
    }
}

fn read_millis(name: &str) -> AppResult<Option<Duration>> {
    Ok(read_var::<u64>(name)?.map(Duration::from_millis))
}
