/// Shared infrastructure concerns
///
/// Connection pooling and migrations for the PostgreSQL job ledger.
pub mod database;

pub use database::{Database, DbConnection, DbPool};
