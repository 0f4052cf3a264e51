//! Name-keyed inventory of discovered migrations

use std::collections::btree_map::{self, BTreeMap};

use super::definitions::MigrationRecord;

/// Migrations keyed by name, iterated in ascending name order.
///
/// Built fresh on every invocation. Inserting a record whose name is already
/// present replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    migrations: BTreeMap<String, MigrationRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the one it replaced if the name collided
    pub fn insert(&mut self, record: MigrationRecord) -> Option<MigrationRecord> {
        self.migrations.insert(record.name.clone(), record)
    }

    pub fn get(&self, name: &str) -> Option<&MigrationRecord> {
        self.migrations.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.migrations.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Records in ascending name order
    pub fn iter(&self) -> btree_map::Values<'_, String, MigrationRecord> {
        self.migrations.values()
    }

    /// Names in ascending order
    pub fn names(&self) -> Vec<String> {
        self.migrations.keys().cloned().collect()
    }
}

impl FromIterator<MigrationRecord> for Catalog {
    fn from_iter<I: IntoIterator<Item = MigrationRecord>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for record in iter {
            catalog.insert(record);
        }
        catalog
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a MigrationRecord;
    type IntoIter = btree_map::Values<'a, String, MigrationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
