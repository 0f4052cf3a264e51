//! Core Database Backend Traits
//!
//! The migration engine talks to a database only through these traits. A
//! connection hands out at most one transaction at a time; migrations and the
//! ledger run their statements on that transaction.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};

use crate::error::{MigrateError, MigrateResult};

/// Supported database engine families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adapter {
    Sqlite,
    MySql,
    Postgres,
}

impl Adapter {
    /// Resolve an adapter identifier, failing for engines we cannot drive
    pub fn parse(identifier: &str) -> MigrateResult<Self> {
        match identifier.trim().to_ascii_lowercase().as_str() {
            "sqlite3" | "sqlite" => Ok(Adapter::Sqlite),
            "mysql" | "mariadb" => Ok(Adapter::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Adapter::Postgres),
            other => Err(MigrateError::Configuration(format!(
                "Unsupported adapter \"{}\"",
                other
            ))),
        }
    }

    /// Canonical identifier, as written in the databases file
    pub fn as_str(&self) -> &'static str {
        match self {
            Adapter::Sqlite => "sqlite3",
            Adapter::MySql => "mysql",
            Adapter::Postgres => "postgres",
        }
    }

    /// SQL expression evaluating to the current time on this engine
    pub fn now_sql(&self) -> &'static str {
        match self {
            Adapter::Sqlite => "datetime('now')",
            Adapter::MySql => "NOW()",
            Adapter::Postgres => "CURRENT_TIMESTAMP",
        }
    }

    /// Bind placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Adapter::Postgres => format!("${}", index),
            Adapter::Sqlite | Adapter::MySql => "?".to_string(),
        }
    }

    /// SQL dialect used when splitting migration files into statements
    pub fn dialect(&self) -> Box<dyn Dialect> {
        match self {
            Adapter::Sqlite => Box::new(SQLiteDialect {}),
            Adapter::MySql => Box::new(MySqlDialect {}),
            Adapter::Postgres => Box::new(PostgreSqlDialect {}),
        }
    }
}

impl FromStr for Adapter {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Adapter::parse(s)
    }
}

impl fmt::Display for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract database connection trait
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Adapter identifier as configured; resolved with [`Adapter::parse`] by callers
    fn adapter(&self) -> &str;

    /// Execute a statement outside any transaction and return affected rows count
    async fn execute(&self, sql: &str, params: &[String]) -> MigrateResult<u64>;

    /// Execute a query and return the first column of every row as text
    async fn fetch_column(&self, sql: &str, params: &[String]) -> MigrateResult<Vec<String>>;

    /// Execute a query and return the first two columns of every row as text
    async fn fetch_pairs(
        &self,
        sql: &str,
        params: &[String],
    ) -> MigrateResult<Vec<(String, Option<String>)>>;

    /// Begin a transaction
    async fn begin(&self) -> MigrateResult<Box<dyn DatabaseTransaction>>;
}

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Adapter identifier of the connection this transaction belongs to
    fn adapter(&self) -> &str;

    /// Execute a statement within the transaction
    async fn execute(&mut self, sql: &str, params: &[String]) -> MigrateResult<u64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}
