//! Error types for the migration system
//!
//! Every fallible operation in this crate returns [`MigrateResult`]. The
//! variants follow the order in which a command can fail: configuration,
//! discovery, selection, then execution inside the batch transaction.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Bad or missing environment, unsupported adapter, malformed databases file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The migrations directory could not be listed
    #[error("Failed to read migrations directory '{}': {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The migrations directory exists but holds no valid migration
    #[error("No migrations found in '{}'", .0.display())]
    NoMigrations(PathBuf),

    #[error("No such migration: {0}")]
    NoSuchMigration(String),

    #[error("Migration {0} is already applied")]
    AlreadyApplied(String),

    #[error("Migration {0} is not applied")]
    NotApplied(String),

    #[error("Nothing to apply, all selected migrations are already applied")]
    NothingToApply,

    /// A migration operation failed; the batch was rolled back
    #[error("Failed to execute migration {name}: {message}")]
    Execution { name: String, message: String },

    /// Ledger table missing, or registering/deregistering migrations failed
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Connection, transaction or query failure outside a migration operation
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        MigrateError::Database(err.to_string())
    }
}

