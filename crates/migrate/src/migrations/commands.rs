//! Command handlers
//!
//! One method per user-facing verb. Each runs the shared preflight (catalog,
//! ledger table, applied names), turns its argument into a [`Batch`] with the
//! selector, and hands that batch to the [`MigrationRunner`].

use std::collections::HashSet;

use tracing::debug;

use super::catalog::Catalog;
use super::definitions::{migration_name, BatchReport, MigrationRecord, MigrationState};
use super::ledger::Ledger;
use super::manager::collect_migrations;
use super::runner::{Batch, MigrationRunner};
use super::selector::{exclude, select_one};
use crate::backends::DatabaseConnection;
use crate::config::MigrateConfig;
use crate::error::{MigrateError, MigrateResult};

const NO_SKIP: &[&str] = &[];

/// Entry point for the migration commands
pub struct Migrator<'a> {
    config: &'a MigrateConfig,
    conn: &'a dyn DatabaseConnection,
    ledger: Ledger,
}

/// State every command starts from
struct Preflight {
    catalog: Catalog,
    applied: Vec<String>,
}

impl<'a> Migrator<'a> {
    pub fn new(config: &'a MigrateConfig, conn: &'a dyn DatabaseConnection) -> Self {
        Self {
            config,
            conn,
            ledger: Ledger::new(config.ledger_table.clone()),
        }
    }

    async fn preflight(&self) -> MigrateResult<Preflight> {
        let catalog = collect_migrations(&self.config.migrations_dir).await?;
        if catalog.is_empty() {
            return Err(MigrateError::NoMigrations(self.config.migrations_dir.clone()));
        }

        self.ledger.initialize(self.conn).await?;
        let applied = self.ledger.applied_names(self.conn).await?;
        debug!(
            "Found {} migration(s), {} applied",
            catalog.len(),
            applied.len()
        );

        Ok(Preflight { catalog, applied })
    }

    async fn execute(&self, batch: Batch) -> MigrateResult<BatchReport> {
        MigrationRunner::new(self.conn, &self.ledger).execute(&batch).await
    }

    /// Apply exactly one migration
    pub async fn apply(&self, name: &str) -> MigrateResult<BatchReport> {
        let Preflight { catalog, applied } = self.preflight().await?;

        let selected = select_one(&catalog, name);
        if selected.is_empty() {
            return Err(MigrateError::NoSuchMigration(migration_name(name)));
        }

        let pending = exclude(&selected, &applied);
        if pending.is_empty() {
            return Err(MigrateError::AlreadyApplied(migration_name(name)));
        }

        self.execute(Batch::up(pending)).await
    }

    /// Revert exactly one applied migration
    pub async fn revert(&self, name: &str) -> MigrateResult<BatchReport> {
        let Preflight { catalog, applied } = self.preflight().await?;

        let selected = select_one(&catalog, name);
        if selected.is_empty() {
            return Err(MigrateError::NoSuchMigration(migration_name(name)));
        }

        let not_applied = exclude(&selected, &applied);
        if !not_applied.is_empty() {
            return Err(MigrateError::NotApplied(migration_name(name)));
        }

        self.execute(Batch::down(selected)).await
    }

    /// Apply every pending migration up to and including `target`, or all of them
    pub async fn up(&self, target: Option<&str>) -> MigrateResult<BatchReport> {
        let Preflight { catalog, applied } = self.preflight().await?;

        let ascending = exclude(&catalog, NO_SKIP);
        let range = prefix_through(&ascending, target)?;

        let pending = exclude(range, &applied);
        if pending.is_empty() {
            return Err(MigrateError::NothingToApply);
        }

        self.execute(Batch::up(pending)).await
    }

    /// Revert applied migrations from the newest down to and including
    /// `target`, or all of them.
    ///
    /// Unlike [`Migrator::up`], nothing to revert is not an error.
    pub async fn down(&self, target: Option<&str>) -> MigrateResult<BatchReport> {
        let Preflight { catalog, applied } = self.preflight().await?;

        let mut descending = exclude(&catalog, NO_SKIP);
        descending.reverse();
        let range = prefix_through(&descending, target)?;

        let applied: HashSet<&str> = applied.iter().map(String::as_str).collect();
        let to_revert: Vec<MigrationRecord> = range
            .iter()
            .filter(|record| applied.contains(record.name.as_str()))
            .cloned()
            .collect();

        self.execute(Batch::down(to_revert)).await
    }

    /// Every catalog entry with its ledger state, plus applied migrations whose
    /// file has disappeared
    pub async fn status(&self) -> MigrateResult<Vec<MigrationState>> {
        let catalog = collect_migrations(&self.config.migrations_dir).await?;
        self.ledger.initialize(self.conn).await?;
        let entries = self.ledger.entries(self.conn).await?;

        let mut states: Vec<MigrationState> = catalog
            .iter()
            .map(|record| match entries.iter().find(|e| e.name == record.name) {
                Some(entry) => MigrationState::Applied {
                    name: record.name.clone(),
                    applied_at: entry.applied_at.clone(),
                },
                None => MigrationState::Pending {
                    name: record.name.clone(),
                },
            })
            .collect();

        states.extend(
            entries
                .into_iter()
                .filter(|entry| !catalog.contains(&entry.name))
                .map(|entry| MigrationState::Missing {
                    name: entry.name,
                    applied_at: entry.applied_at,
                }),
        );
        states.sort_by(|a, b| a.name().cmp(b.name()));

        Ok(states)
    }
}

/// Leading slice of `ordered` ending at `target`, or all of it.
///
/// Without a target the range ends at the last element.
fn prefix_through<'r>(
    ordered: &'r [MigrationRecord],
    target: Option<&str>,
) -> MigrateResult<&'r [MigrationRecord]> {
    let target = match target {
        Some(identifier) => migration_name(identifier),
        None => match ordered.last() {
            Some(last) => last.name.clone(),
            None => return Ok(ordered),
        },
    };

    let position = ordered
        .iter()
        .position(|record| record.name == target)
        .ok_or(MigrateError::NoSuchMigration(target))?;

    Ok(&ordered[..=position])
}
