//! sqlx backend
//!
//! Drives PostgreSQL, MySQL and SQLite through sqlx's `Any` driver. The pool is
//! capped at a single connection: a migration run never needs more, and the
//! ledger reads must observe the same session the batches run on.

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyPool, Row, Transaction};
use tracing::debug;

use super::core::{Adapter, DatabaseConnection, DatabaseTransaction};
use crate::config::DatabaseConfig;
use crate::error::{MigrateError, MigrateResult};

/// Single-connection sqlx pool tagged with its adapter identifier
pub struct SqlxConnection {
    pool: AnyPool,
    adapter: String,
}

impl SqlxConnection {
    /// Connect using an environment's database configuration
    pub async fn connect(config: &DatabaseConfig) -> MigrateResult<Self> {
        let adapter = config.adapter_name()?;
        Adapter::parse(&adapter)?;

        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&config.url)
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to connect to database: {}", e)))?;

        debug!("Connected to {} database", adapter);
        Ok(Self { pool, adapter })
    }

    /// Close the underlying pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn text_column(row: &AnyRow, index: usize) -> MigrateResult<Option<String>> {
    row.try_get::<Option<String>, _>(index)
        .map_err(|e| MigrateError::Database(format!("Failed to read column {}: {}", index, e)))
}

#[async_trait]
impl DatabaseConnection for SqlxConnection {
    fn adapter(&self) -> &str {
        &self.adapter
    }

    async fn execute(&self, sql: &str, params: &[String]) -> MigrateResult<u64> {
        debug!("Executing: {}", sql);
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.clone());
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn fetch_column(&self, sql: &str, params: &[String]) -> MigrateResult<Vec<String>> {
        debug!("Querying: {}", sql);
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| text_column(row, 0).map(Option::unwrap_or_default))
            .collect()
    }

    async fn fetch_pairs(
        &self,
        sql: &str,
        params: &[String],
    ) -> MigrateResult<Vec<(String, Option<String>)>> {
        debug!("Querying: {}", sql);
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> MigrateResult<(String, Option<String>)> {
                Ok((text_column(row, 0)?.unwrap_or_default(), text_column(row, 1)?))
            })
            .collect()
    }

    async fn begin(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        let inner = self
            .pool
            .begin()
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to start transaction: {}", e)))?;
        debug!("Database transaction started");

        Ok(Box::new(SqlxTransaction {
            inner,
            adapter: self.adapter.clone(),
        }))
    }
}

/// Transaction on the single pooled connection
pub struct SqlxTransaction {
    inner: Transaction<'static, Any>,
    adapter: String,
}

#[async_trait]
impl DatabaseTransaction for SqlxTransaction {
    fn adapter(&self) -> &str {
        &self.adapter
    }

    async fn execute(&mut self, sql: &str, params: &[String]) -> MigrateResult<u64> {
        debug!("Executing in transaction: {}", sql);
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.clone());
        }
        let result = query.execute(&mut *self.inner).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.inner
            .commit()
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to commit transaction: {}", e)))
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.inner
            .rollback()
            .await
            .map_err(|e| MigrateError::Database(format!("Failed to rollback transaction: {}", e)))
    }
}
