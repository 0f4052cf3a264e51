//! Migration ledger
//!
//! A single table recording which migrations are currently applied. Rows are
//! only ever written through [`Ledger::register`] and [`Ledger::deregister`],
//! inside the same transaction as the schema changes they describe.

use tracing::debug;

use super::definitions::{LedgerEntry, MigrationRecord};
use crate::backends::{Adapter, DatabaseConnection, DatabaseTransaction};
use crate::error::{MigrateError, MigrateResult};

/// Ledger stored in the table `table`
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    pub fn new(table: impl Into<String>) -> Self {
        Self { table: table.into() }
    }

    /// SQL to create the ledger table
    pub fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (name VARCHAR(255) PRIMARY KEY NOT NULL, date TEXT)",
            self.table
        )
    }

    /// SQL to list applied migration names
    pub fn applied_names_sql(&self) -> String {
        format!("SELECT name FROM {} ORDER BY name ASC", self.table)
    }

    /// SQL to record a migration as applied
    pub fn register_sql(&self, adapter: Adapter) -> String {
        format!(
            "INSERT INTO {} (name, date) VALUES ({}, {})",
            self.table,
            adapter.placeholder(1),
            adapter.now_sql()
        )
    }

    /// SQL to remove a migration record
    pub fn deregister_sql(&self, adapter: Adapter) -> String {
        format!("DELETE FROM {} WHERE name = {}", self.table, adapter.placeholder(1))
    }

    /// Ensure the ledger table exists. Safe to call on every invocation.
    pub async fn initialize(&self, conn: &dyn DatabaseConnection) -> MigrateResult<()> {
        conn.execute(&self.create_table_sql(), &[])
            .await
            .map_err(|e| MigrateError::Ledger(format!("Failed to create ledger table {}: {}", self.table, e)))?;
        Ok(())
    }

    /// Names of applied migrations in ascending order.
    ///
    /// Fails if the ledger table does not exist yet.
    pub async fn applied_names(&self, conn: &dyn DatabaseConnection) -> MigrateResult<Vec<String>> {
        conn.fetch_column(&self.applied_names_sql(), &[])
            .await
            .map_err(|e| MigrateError::Ledger(format!("Failed to query applied migrations: {}", e)))
    }

    /// Applied migrations with their timestamps, in ascending name order
    pub async fn entries(&self, conn: &dyn DatabaseConnection) -> MigrateResult<Vec<LedgerEntry>> {
        let sql = format!("SELECT name, date FROM {} ORDER BY name ASC", self.table);
        let rows = conn
            .fetch_pairs(&sql, &[])
            .await
            .map_err(|e| MigrateError::Ledger(format!("Failed to query applied migrations: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(name, applied_at)| LedgerEntry { name, applied_at })
            .collect())
    }

    /// Record `records` as applied, in order, within `tx`
    pub async fn register(
        &self,
        tx: &mut dyn DatabaseTransaction,
        records: &[MigrationRecord],
    ) -> MigrateResult<()> {
        // Resolve the adapter before touching the transaction
        let adapter = Adapter::parse(tx.adapter())?;
        let sql = self.register_sql(adapter);

        for record in records {
            debug!("Registering migration {}", record.name);
            tx.execute(&sql, &[record.name.clone()]).await.map_err(|e| {
                MigrateError::Ledger(format!("Failed to record migration {}: {}", record.name, e))
            })?;
        }
        Ok(())
    }

    /// Remove `records` from the ledger, in order, within `tx`
    pub async fn deregister(
        &self,
        tx: &mut dyn DatabaseTransaction,
        records: &[MigrationRecord],
    ) -> MigrateResult<()> {
        let adapter = Adapter::parse(tx.adapter())?;
        let sql = self.deregister_sql(adapter);

        for record in records {
            debug!("Deregistering migration {}", record.name);
            tx.execute(&sql, &[record.name.clone()]).await.map_err(|e| {
                MigrateError::Ledger(format!("Failed to remove migration record {}: {}", record.name, e))
            })?;
        }
        Ok(())
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new("migrations")
    }
}
