/// PostgreSQL test utilities
///
/// One pool per test binary, built from TEST_DATABASE_URL with migrations
/// applied. Tests touching the database hold the global lock and start from a
/// truncated table.
use boardshelf_lib::shared::infrastructure::{Database, DbPool};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use std::sync::{Mutex, MutexGuard, OnceLock};

static DB_POOL: OnceLock<DbPool> = OnceLock::new();

/// Get or create the shared test pool
pub fn get_test_db_pool() -> DbPool {
    DB_POOL
        .get_or_init(|| {
            dotenvy::dotenv().ok();
            let test_db_url = std::env::var("TEST_DATABASE_URL")
                .expect("TEST_DATABASE_URL must be set in .env for database tests");

            let manager = ConnectionManager::<PgConnection>::new(test_db_url);
            let pool = r2d2::Pool::builder()
                .max_size(5)
                .build(manager)
                .expect("Failed to create test database pool");

            Database::from_pool(pool.clone())
                .run_migrations()
                .expect("Failed to run migrations on test database");

            pool
        })
        .clone()
}

/// Empty the job table; call at the start of each test
pub fn clean_test_db() {
    let pool = get_test_db_pool();
    let mut conn = pool.get().expect("Failed to get DB connection");

    diesel::sql_query("TRUNCATE TABLE scrape_jobs")
        .execute(&mut conn)
        .expect("Failed to clean scrape_jobs");
}

/// Backdate a row (and its completion time, if any) by `age`
pub fn backdate(job_id: uuid::Uuid, age: chrono::Duration) {
    let pool = get_test_db_pool();
    let mut conn = pool.get().expect("Failed to get DB connection");

    diesel::sql_query(
        "UPDATE scrape_jobs
         SET created_at = $1,
             completed_at = CASE WHEN completed_at IS NULL THEN NULL ELSE $1 END
         WHERE id = $2",
    )
    .bind::<diesel::sql_types::Timestamptz, _>(chrono::Utc::now() - age)
    .bind::<diesel::sql_types::Uuid, _>(job_id)
    .execute(&mut conn)
    .expect("Failed to backdate job");
}

static TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serialize database tests; a panicking test must not block the rest
pub fn acquire_test_lock() -> MutexGuard<'static, ()> {
    match TEST_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
