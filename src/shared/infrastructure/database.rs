use crate::log_info;
use crate::shared::errors::AppError;
use crate::shared::utils::logger::{LogContext, TimedOperation, SLOW_CHECKOUT_MS};
use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, Pool};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::env;
use std::time::Duration;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Pooled PostgreSQL handle backing the durable job ledger
#[derive(Debug)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Connect using `DATABASE_URL`
    pub fn new() -> Result<Self, AppError> {
        let database_url = Self::get_validated_database_url()?;
        Self::connect(&database_url)
    }

    pub fn connect(database_url: &str) -> Result<Self, AppError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);

        // The queue issues short single-statement queries from one worker plus
        // a handful of callers, so a small pool is plenty.
        let pool = r2d2::Pool::builder()
            .max_size(8)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(10))
            .idle_timeout(Some(Duration::from_secs(300)))
            .max_lifetime(Some(Duration::from_secs(1800)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                AppError::DatabaseError(format!("Failed to create connection pool: {}", e))
            })?;

        log_info!(
            "Database connection pool initialized with max_size: {}",
            pool.max_size()
        );

        Ok(Self { pool })
    }

    /// Create a Database instance from an existing pool (useful for testing)
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    fn get_validated_database_url() -> Result<String, AppError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| {
            AppError::ConfigurationError("DATABASE_URL environment variable not found".to_string())
        })?;

        if !database_url.starts_with("postgres://") && !database_url.starts_with("postgresql://") {
            return Err(AppError::ConfigurationError(
                "Invalid database URL format. Must start with postgres:// or postgresql://"
                    .to_string(),
            ));
        }

        // Log connection attempt without exposing credentials
        log_info!(
            "Initializing database connection to: {}",
            database_url.split('@').last().unwrap_or("unknown_host")
        );

        Ok(database_url)
    }

    /// Check out a pooled connection, warning when the pool is slow to hand one over
    pub fn get_connection(&self) -> Result<DbConnection, AppError> {
        let timer = TimedOperation::start("db connection checkout");

        let conn = self.pool.get().map_err(|e| {
            LogContext::error_with_context(&e, "Failed to check out a database connection");
            AppError::from(e)
        })?;

        LogContext::slow_operation("db connection checkout", timer.elapsed_ms(), SLOW_CHECKOUT_MS);
        Ok(conn)
    }

    /// Apply any embedded migrations that have not run yet
    pub fn run_migrations(&self) -> Result<usize, AppError> {
        let mut conn = self.get_connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| AppError::DatabaseError(format!("Failed to run migrations: {}", e)))?;

        log_info!("Database migrations completed ({} applied)", applied.len());
        Ok(applied.len())
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
