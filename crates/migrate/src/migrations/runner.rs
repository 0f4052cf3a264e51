//! Migration Runner - Executes migration batches against the database
//!
//! A batch runs inside one transaction: every migration operation, then the
//! ledger update, then commit. Any failure rolls the whole batch back, so a
//! batch is either fully reflected in both schema and ledger or not at all.

use std::time::Instant;

use tracing::{debug, error, info};

use super::definitions::{BatchReport, MigrationDirection, MigrationRecord};
use super::ledger::Ledger;
use crate::backends::{Adapter, DatabaseConnection, DatabaseTransaction};
use crate::error::{MigrateError, MigrateResult};

/// Ledger step run after every migration in a batch succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalizer {
    Register,
    Deregister,
}

/// An ordered set of migrations run together in one transaction
#[derive(Debug, Clone)]
pub struct Batch {
    pub direction: MigrationDirection,
    pub finalizer: Finalizer,
    pub records: Vec<MigrationRecord>,
}

impl Batch {
    /// Apply `records` in the given (ascending) order and register them
    pub fn up(records: Vec<MigrationRecord>) -> Self {
        Self {
            direction: MigrationDirection::Up,
            finalizer: Finalizer::Register,
            records,
        }
    }

    /// Revert `records` in the given (descending) order and deregister them
    pub fn down(records: Vec<MigrationRecord>) -> Self {
        Self {
            direction: MigrationDirection::Down,
            finalizer: Finalizer::Deregister,
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Runs batches on one connection, keeping the ledger in step
pub struct MigrationRunner<'a> {
    conn: &'a dyn DatabaseConnection,
    ledger: &'a Ledger,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(conn: &'a dyn DatabaseConnection, ledger: &'a Ledger) -> Self {
        Self { conn, ledger }
    }

    /// Execute a batch, all or nothing.
    ///
    /// Records run strictly in the order given; the runner never reorders.
    /// An empty batch succeeds without opening a transaction.
    pub async fn execute(&self, batch: &Batch) -> MigrateResult<BatchReport> {
        if batch.is_empty() {
            return Ok(BatchReport::empty(batch.direction));
        }

        let start_time = Instant::now();
        let mut tx = self.conn.begin().await?;

        if let Err(e) = self.run_in_transaction(tx.as_mut(), batch).await {
            rollback(tx, &e).await;
            return Err(e);
        }

        tx.commit().await?;

        let migrations: Vec<String> = batch.records.iter().map(|r| r.name.clone()).collect();
        info!(
            "Committed {} batch of {} migration(s)",
            batch.direction,
            migrations.len()
        );

        Ok(BatchReport {
            direction: batch.direction,
            migrations,
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    async fn run_in_transaction(
        &self,
        tx: &mut dyn DatabaseTransaction,
        batch: &Batch,
    ) -> MigrateResult<()> {
        // An unsupported adapter fails the batch before any statement runs
        Adapter::parse(tx.adapter())?;

        for record in &batch.records {
            match batch.direction {
                MigrationDirection::Up => info!("Applying migration: {}", record.name),
                MigrationDirection::Down => info!("Rolling back migration: {}", record.name),
            }

            record
                .run(batch.direction, tx)
                .await
                .map_err(|e| MigrateError::Execution {
                    name: record.name.clone(),
                    message: e.to_string(),
                })?;
        }

        debug!("Running {:?} finalizer for {} migration(s)", batch.finalizer, batch.records.len());
        match batch.finalizer {
            Finalizer::Register => self.ledger.register(tx, &batch.records).await,
            Finalizer::Deregister => self.ledger.deregister(tx, &batch.records).await,
        }
    }
}

async fn rollback(tx: Box<dyn DatabaseTransaction>, cause: &MigrateError) {
    debug!("Rolling back batch after error: {}", cause);
    if let Err(e) = tx.rollback().await {
        error!("Failed to roll back batch after \"{}\": {}", cause, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::recording::RecordingConnection;
    use crate::migrations::definitions::MigrationOperations;
    use crate::migrations::manager::SqlMigration;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Runs one marker statement per direction, optionally failing
    struct Step {
        name: &'static str,
        fail_up: bool,
    }

    #[async_trait]
    impl MigrationOperations for Step {
        async fn up(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()> {
            if self.fail_up {
                return Err(MigrateError::Database(format!("{} is broken", self.name)));
            }
            tx.execute(&format!("UP {}", self.name), &[]).await?;
            Ok(())
        }

        async fn down(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()> {
            tx.execute(&format!("DOWN {}", self.name), &[]).await?;
            Ok(())
        }
    }

    fn step(name: &'static str, fail_up: bool) -> MigrationRecord {
        MigrationRecord::new(name, format!("{}.sql", name), Arc::new(Step { name, fail_up }))
    }

    #[tokio::test]
    async fn test_batch_commits_operations_then_ledger() {
        let conn = RecordingConnection::new("sqlite3");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let batch = Batch::up(vec![step("001", false), step("003", false)]);
        let report = runner.execute(&batch).await.unwrap();

        assert_eq!(report.direction, MigrationDirection::Up);
        assert_eq!(report.migrations, vec!["001", "003"]);

        let journal = conn.journal();
        assert_eq!(journal.commits, 1);
        assert_eq!(journal.rollbacks, 0);
        assert_eq!(
            journal.committed,
            vec![
                "UP 001",
                "UP 003",
                "INSERT INTO migrations (name, date) VALUES (?, datetime('now')) [001]",
                "INSERT INTO migrations (name, date) VALUES (?, datetime('now')) [003]",
            ]
        );
    }

    #[tokio::test]
    async fn test_down_batch_keeps_given_order() {
        let conn = RecordingConnection::new("postgres");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let batch = Batch::down(vec![step("005", false), step("001", false)]);
        let report = runner.execute(&batch).await.unwrap();
        assert_eq!(report.migrations, vec!["005", "001"]);

        let journal = conn.journal();
        assert_eq!(
            journal.committed,
            vec![
                "DOWN 005",
                "DOWN 001",
                "DELETE FROM migrations WHERE name = $1 [005]",
                "DELETE FROM migrations WHERE name = $1 [001]",
            ]
        );
    }

    #[tokio::test]
    async fn test_failing_migration_rolls_back_whole_batch() {
        let conn = RecordingConnection::new("sqlite3");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        // k-th of n fails: nothing before it persists, nothing after it runs
        let batch = Batch::up(vec![
            step("001", false),
            step("002", false),
            step("003", true),
            step("004", false),
        ]);

        match runner.execute(&batch).await {
            Err(MigrateError::Execution { name, message }) => {
                assert_eq!(name, "003");
                assert!(message.contains("003 is broken"));
            }
            other => panic!("Expected execution error, got {:?}", other),
        }

        let journal = conn.journal();
        assert_eq!(journal.rollbacks, 1);
        assert_eq!(journal.commits, 0);
        assert!(journal.committed.is_empty());
        assert!(journal.pending.is_empty());
    }

    #[tokio::test]
    async fn test_failing_statement_stops_batch() {
        let conn = RecordingConnection::new("sqlite3").failing_on("UP 002");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let batch = Batch::up(vec![step("001", false), step("002", false), step("003", false)]);
        let result = runner.execute(&batch).await;

        assert!(matches!(result, Err(MigrateError::Execution { ref name, .. }) if name == "002"));
        assert!(conn.journal().committed.is_empty());
        assert_eq!(conn.journal().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_failing_finalizer_rolls_back_schema_changes() {
        let conn = RecordingConnection::new("mysql").failing_on("INSERT INTO migrations");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let batch = Batch::up(vec![step("001", false), step("002", false)]);
        let result = runner.execute(&batch).await;

        assert!(matches!(result, Err(MigrateError::Ledger(_))));
        let journal = conn.journal();
        assert!(journal.committed.is_empty());
        assert_eq!(journal.rollbacks, 1);
    }

    #[tokio::test]
    async fn test_unsupported_adapter_rolls_back() {
        let conn = RecordingConnection::new("oracle");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let result = runner.execute(&Batch::up(vec![step("001", false)])).await;

        assert!(matches!(result, Err(MigrateError::Configuration(_))));
        assert!(conn.journal().committed.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_adapter_stops_sql_migrations_before_any_statement() {
        let conn = RecordingConnection::new("oracle");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let sql = SqlMigration::parse("-- Up migration\nCREATE TABLE a (id INTEGER);\n-- Down migration\n")
            .unwrap();
        let record = MigrationRecord::new("001", "001.sql", Arc::new(sql));

        match runner.execute(&Batch::up(vec![record])).await {
            Err(MigrateError::Configuration(message)) => assert!(message.contains("oracle")),
            other => panic!("Expected configuration error, got {:?}", other),
        }

        let journal = conn.journal();
        assert_eq!(journal.rollbacks, 1);
        assert!(journal.pending.is_empty());
        assert!(journal.committed.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_opens_no_transaction() {
        let conn = RecordingConnection::new("sqlite3");
        let ledger = Ledger::default();
        let runner = MigrationRunner::new(&conn, &ledger);

        let report = runner.execute(&Batch::down(Vec::new())).await.unwrap();
        assert!(report.is_empty());
        assert_eq!(report.direction, MigrationDirection::Down);
        assert_eq!(conn.journal().begins, 0);
    }
}
