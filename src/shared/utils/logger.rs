use log::{debug, error, info, warn};
use std::sync::Once;
use std::time::Instant;

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,boardshelf_lib=debug,diesel=warn,tokio=warn";

/// Connection checkouts slower than this are logged as warnings
pub const SLOW_CHECKOUT_MS: u64 = 100;

/// Initialize env_logger once per process.
///
/// `RUST_LOG` replaces the default filter entirely.
pub fn init_logger() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
            .format_timestamp_millis()
            .format_target(false)
            .format_module_path(false)
            .init();

        info!("Logging initialized");
    });
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        log::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        log::error!($($arg)*)
    };
}

/// One-line log formats shared by the store and the worker
pub struct LogContext;

impl LogContext {
    /// Bulk statement on a table; zero-row results are only worth a debug line
    pub fn db_operation(operation: &str, table: &str, affected: Option<usize>) {
        match affected {
            Some(0) => debug!("DB: {} on {} touched no rows", operation, table),
            Some(rows) => info!("DB: {} on {} affected {} rows", operation, table, rows),
            None => debug!("DB: {} on {}", operation, table),
        }
    }

    pub fn error_with_context(error: &dyn std::error::Error, context: &str) {
        error!("{}: {}", context, error);
    }

    pub fn slow_operation(operation: &str, elapsed_ms: u64, threshold_ms: u64) {
        if elapsed_ms > threshold_ms {
            warn!(
                "Slow: {} took {}ms (threshold {}ms)",
                operation, elapsed_ms, threshold_ms
            );
        }
    }

    pub fn duration(operation: &str, elapsed_ms: u64, outcome: &str) {
        info!("Timing: {} {} in {}ms", operation, outcome, elapsed_ms);
    }
}

/// Measures one operation from construction to `finish`
pub struct TimedOperation {
    started: Instant,
    label: String,
}

impl TimedOperation {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        debug!("Starting: {}", label);
        Self {
            started: Instant::now(),
            label,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Log the outcome with the elapsed time and return the milliseconds
    pub fn finish(self, outcome: &str) -> u64 {
        let elapsed = self.elapsed_ms();
        LogContext::duration(&self.label, elapsed, outcome);
        elapsed
    }
}
