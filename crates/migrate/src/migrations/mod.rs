//! Migration System
//!
//! Discovery (`manager`), the name-keyed `catalog`, pure `selector` functions,
//! the `ledger` table, the transactional `runner`, and the `commands` built on
//! top of them.

pub mod catalog;
pub mod commands;
pub mod definitions;
pub mod ledger;
pub mod manager;
pub mod runner;
pub mod selector;

pub use catalog::Catalog;
pub use commands::Migrator;
pub use definitions::{
    migration_name, BatchReport, LedgerEntry, MigrationDirection, MigrationOperations, MigrationRecord,
    MigrationState,
};
pub use ledger::Ledger;
pub use manager::{collect_migrations, create_migration, split_sql_statements, SqlMigration};
pub use runner::{Batch, Finalizer, MigrationRunner};
