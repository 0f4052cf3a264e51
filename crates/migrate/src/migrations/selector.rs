//! Migration selection
//!
//! Pure functions computing which migrations a command should run. They
//! accept a [`Catalog`] or any previously selected sequence of records, so a
//! selection can itself be filtered again.

use std::collections::HashSet;

use super::catalog::Catalog;
use super::definitions::{migration_name, MigrationRecord};

/// Re-key records by name. Later records win on name collisions.
pub fn normalize<'a, I>(records: I) -> Catalog
where
    I: IntoIterator<Item = &'a MigrationRecord>,
{
    records.into_iter().cloned().collect()
}

/// Select the migration named by `identifier`.
///
/// `identifier` may be a bare name, a file name or a path. Returns a single
/// record, or nothing when no such migration exists.
pub fn select_one<'a, I>(records: I, identifier: &str) -> Vec<MigrationRecord>
where
    I: IntoIterator<Item = &'a MigrationRecord>,
{
    let name = migration_name(identifier);
    normalize(records).get(&name).cloned().into_iter().collect()
}

/// All records whose name is not in `skip`, in ascending name order.
///
/// An empty `skip` list returns everything.
pub fn exclude<'a, I, S>(records: I, skip: &[S]) -> Vec<MigrationRecord>
where
    I: IntoIterator<Item = &'a MigrationRecord>,
    S: AsRef<str>,
{
    let skip: HashSet<String> = skip.iter().map(|name| migration_name(name.as_ref())).collect();

    normalize(records)
        .iter()
        .filter(|record| !skip.contains(&record.name))
        .cloned()
        .collect()
}

/// Names of a sequence of records, in sequence order
pub fn names(records: &[MigrationRecord]) -> Vec<String> {
    records.iter().map(|record| record.name.clone()).collect()
}
