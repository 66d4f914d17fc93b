// Shared kernel: errors, logging, infrastructure

pub mod errors;          // Shared error types
pub mod infrastructure;  // Shared infrastructure (database pool, migrations)
pub mod utils;           // Logging and validation helpers

pub use infrastructure::database::Database;
