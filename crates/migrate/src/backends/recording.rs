//! Recording database double for unit tests
//!
//! Statements executed in a transaction stay pending until commit. Rollback
//! discards them and bumps a counter so tests can assert on both outcomes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::core::{DatabaseConnection, DatabaseTransaction};
use crate::error::{MigrateError, MigrateResult};

#[derive(Debug, Default)]
pub(crate) struct Journal {
    pub committed: Vec<String>,
    pub pending: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
    pub begins: usize,
}

#[derive(Clone)]
pub(crate) struct RecordingConnection {
    adapter: String,
    journal: Arc<Mutex<Journal>>,
    /// Statements containing this marker fail when executed
    fail_on: Option<String>,
}

impl RecordingConnection {
    pub fn new(adapter: &str) -> Self {
        Self {
            adapter: adapter.to_string(),
            journal: Arc::new(Mutex::new(Journal::default())),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }

    fn check(&self, sql: &str) -> MigrateResult<()> {
        match &self.fail_on {
            Some(marker) if sql.contains(marker.as_str()) => {
                Err(MigrateError::Database(format!("statement rejected: {}", sql)))
            }
            _ => Ok(()),
        }
    }
}

fn render(sql: &str, params: &[String]) -> String {
    if params.is_empty() {
        sql.to_string()
    } else {
        format!("{} [{}]", sql, params.join(", "))
    }
}

#[async_trait]
impl DatabaseConnection for RecordingConnection {
    fn adapter(&self) -> &str {
        &self.adapter
    }

    async fn execute(&self, sql: &str, params: &[String]) -> MigrateResult<u64> {
        self.check(sql)?;
        self.journal().committed.push(render(sql, params));
        Ok(0)
    }

    async fn fetch_column(&self, sql: &str, _params: &[String]) -> MigrateResult<Vec<String>> {
        self.check(sql)?;
        Ok(Vec::new())
    }

    async fn fetch_pairs(
        &self,
        sql: &str,
        _params: &[String],
    ) -> MigrateResult<Vec<(String, Option<String>)>> {
        self.check(sql)?;
        Ok(Vec::new())
    }

    async fn begin(&self) -> MigrateResult<Box<dyn DatabaseTransaction>> {
        self.journal().begins += 1;
        Ok(Box::new(RecordingTransaction {
            connection: self.clone(),
        }))
    }
}

pub(crate) struct RecordingTransaction {
    connection: RecordingConnection,
}

#[async_trait]
impl DatabaseTransaction for RecordingTransaction {
    fn adapter(&self) -> &str {
        &self.connection.adapter
    }

    async fn execute(&mut self, sql: &str, params: &[String]) -> MigrateResult<u64> {
        self.connection.check(sql)?;
        self.connection.journal().pending.push(render(sql, params));
        Ok(1)
    }

    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let mut journal = self.connection.journal();
        let pending = std::mem::take(&mut journal.pending);
        journal.committed.extend(pending);
        journal.commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        let mut journal = self.connection.journal();
        journal.pending.clear();
        journal.rollbacks += 1;
        Ok(())
    }
}
