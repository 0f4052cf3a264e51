//! # anydb-migrate
//!
//! Ordered, reversible database migrations with a ledger that always matches
//! the schema.
//!
//! Migrations are `*.sql` files in one directory, ordered by file name. The
//! ledger table records which of them are applied. Every command computes an
//! ordered batch and runs it in a single transaction together with the ledger
//! update, so a failure anywhere in the batch leaves neither schema nor ledger
//! changed.
//!
//! ```rust,no_run
//! use anydb_migrate::{MigrateConfig, Migrator, SqlxConnection};
//!
//! # async fn example() -> anydb_migrate::MigrateResult<()> {
//! let config = MigrateConfig::default().with_environment("test");
//! let conn = SqlxConnection::connect(&config.database()?).await?;
//!
//! let report = Migrator::new(&config, &conn).up(None).await?;
//! println!("applied {:?}", report.migrations);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod migrations;

pub use backends::{Adapter, DatabaseConnection, DatabaseTransaction, SqlxConnection};
pub use config::{load_database_config, DatabaseConfig, MigrateConfig};
pub use error::{MigrateError, MigrateResult};
pub use migrations::*;
