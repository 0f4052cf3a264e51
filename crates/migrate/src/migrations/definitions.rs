//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system: the
//! operations capability every migration exposes, the immutable
//! [`MigrationRecord`] the catalog hands out, and the result types of a batch.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::DatabaseTransaction;
use crate::error::MigrateResult;

/// File extension of migration files
pub const MIGRATION_EXTENSION: &str = "sql";

/// Derive a migration name from a bare name, a file name or a full path.
///
/// Any directory prefix and a trailing `.sql` extension are stripped, so
/// `"migrations/001_users.sql"`, `"001_users.sql"` and `"001_users"` all name
/// the same migration.
pub fn migration_name(identifier: &str) -> String {
    let file_name = Path::new(identifier)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(identifier);

    let suffix = format!(".{}", MIGRATION_EXTENSION);
    file_name
        .strip_suffix(suffix.as_str())
        .unwrap_or(file_name)
        .to_string()
}

/// The two operations every migration provides
#[async_trait]
pub trait MigrationOperations: Send + Sync {
    /// Apply the change
    async fn up(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()>;

    /// Reverse the change
    async fn down(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()>;
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    /// Apply the migration (run UP operations)
    Up,
    /// Rollback the migration (run DOWN operations)
    Down,
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => f.write_str("up"),
            MigrationDirection::Down => f.write_str("down"),
        }
    }
}

/// A discovered migration. Cheap to clone; the operations are shared.
#[derive(Clone)]
pub struct MigrationRecord {
    /// Unique name within a catalog, ordered lexicographically
    pub name: String,
    /// Where the migration was loaded from
    pub source: PathBuf,
    operations: Arc<dyn MigrationOperations>,
}

impl MigrationRecord {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        operations: Arc<dyn MigrationOperations>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            operations,
        }
    }

    /// Run the operation for `direction` on the given transaction
    pub async fn run(
        &self,
        direction: MigrationDirection,
        tx: &mut dyn DatabaseTransaction,
    ) -> MigrateResult<()> {
        match direction {
            MigrationDirection::Up => self.operations.up(tx).await,
            MigrationDirection::Down => self.operations.down(tx).await,
        }
    }
}

impl fmt::Debug for MigrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationRecord")
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

/// Migration status in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Migration name
    pub name: String,
    /// When the migration was applied, as stored by the database
    pub applied_at: Option<String>,
}

/// Status of one migration as reported by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// In the catalog, not in the ledger
    Pending { name: String },
    /// In the catalog and in the ledger
    Applied { name: String, applied_at: Option<String> },
    /// In the ledger, but its file is gone from the catalog
    Missing { name: String, applied_at: Option<String> },
}

impl MigrationState {
    pub fn name(&self) -> &str {
        match self {
            MigrationState::Pending { name }
            | MigrationState::Applied { name, .. }
            | MigrationState::Missing { name, .. } => name,
        }
    }
}

/// Result of running one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Direction the batch ran in
    pub direction: MigrationDirection,
    /// Names of the migrations that ran, in execution order
    pub migrations: Vec<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl BatchReport {
    pub fn empty(direction: MigrationDirection) -> Self {
        Self {
            direction,
            migrations: Vec::new(),
            execution_time_ms: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}
