//! Configuration for the migration system
//!
//! [`MigrateConfig`] is built once per invocation and passed by reference to
//! every command. Connection parameters live in a separate databases file that
//! maps environment names to [`DatabaseConfig`] entries.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{MigrateError, MigrateResult};

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// File with database environment definitions
    pub databases_file: PathBuf,
    /// Environment to look up in the databases file
    pub environment: String,
    /// Table name for tracking applied migrations
    pub ledger_table: String,
    /// Log skipped files and executed statements
    pub verbose: bool,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("./migrations"),
            databases_file: PathBuf::from("./database.json"),
            environment: "default".to_string(),
            ledger_table: "migrations".to_string(),
            verbose: false,
        }
    }
}

impl MigrateConfig {
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn with_databases_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.databases_file = file.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check that the configured paths point at something usable
    pub fn validate(&self) -> MigrateResult<()> {
        if !self.migrations_dir.is_dir() {
            return Err(MigrateError::Configuration(format!(
                "\"{}\" is not a directory",
                self.migrations_dir.display()
            )));
        }
        if !self.databases_file.is_file() {
            return Err(MigrateError::Configuration(format!(
                "\"{}\" is not a file",
                self.databases_file.display()
            )));
        }
        if self.environment.trim().is_empty() {
            return Err(MigrateError::Configuration("environment name is empty".to_string()));
        }
        if !is_identifier(&self.ledger_table) {
            return Err(MigrateError::Configuration(format!(
                "invalid ledger table name \"{}\"",
                self.ledger_table
            )));
        }
        Ok(())
    }

    /// Resolve the configured environment, failing if it is not defined
    pub fn database(&self) -> MigrateResult<DatabaseConfig> {
        load_database_config(&self.databases_file, &self.environment)?.ok_or_else(|| {
            MigrateError::Configuration(format!(
                "environment \"{}\" not found in \"{}\"",
                self.environment,
                self.databases_file.display()
            ))
        })
    }
}

/// Connection parameters for one environment
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "DatabaseEntry")]
pub struct DatabaseConfig {
    /// Connection URL understood by sqlx
    pub url: String,
    /// Adapter identifier; derived from the URL scheme when absent
    pub adapter: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatabaseEntry {
    Url(String),
    Detailed { url: String, adapter: Option<String> },
}

impl From<DatabaseEntry> for DatabaseConfig {
    fn from(entry: DatabaseEntry) -> Self {
        match entry {
            DatabaseEntry::Url(url) => DatabaseConfig { url, adapter: None },
            DatabaseEntry::Detailed { url, adapter } => DatabaseConfig { url, adapter },
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            adapter: None,
        }
    }

    pub fn with_adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Adapter identifier, explicit or derived from the URL scheme
    pub fn adapter_name(&self) -> MigrateResult<String> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let scheme = match url::Url::parse(&self.url) {
            Ok(parsed) => parsed.scheme().to_string(),
            // `sqlite::memory:` and friends are not valid URLs
            Err(_) => self.url.split(':').next().unwrap_or_default().to_string(),
        };

        match scheme.as_str() {
            "sqlite" | "sqlite3" => Ok("sqlite3".to_string()),
            "postgres" | "postgresql" => Ok("postgres".to_string()),
            "mysql" | "mariadb" => Ok("mysql".to_string()),
            "" => Err(MigrateError::Configuration(format!(
                "cannot derive adapter from \"{}\"",
                self.url
            ))),
            other => Ok(other.to_string()),
        }
    }
}

/// Load the databases file and return the entry for `environment`.
///
/// A missing environment is `Ok(None)`; an unreadable or malformed file is a
/// configuration error.
pub fn load_database_config(path: &Path, environment: &str) -> MigrateResult<Option<DatabaseConfig>> {
    let data = fs::read_to_string(path).map_err(|e| {
        MigrateError::Configuration(format!("Failed to read \"{}\": {}", path.display(), e))
    })?;

    let is_yaml = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yml") | Some("yaml")
    );

    let mut environments: HashMap<String, DatabaseConfig> = if is_yaml {
        serde_yaml::from_str(&data).map_err(|e| {
            MigrateError::Configuration(format!("Failed to parse \"{}\": {}", path.display(), e))
        })?
    } else {
        serde_json::from_str(&data).map_err(|e| {
            MigrateError::Configuration(format!("Failed to parse \"{}\": {}", path.display(), e))
        })?
    };

    let found = environments.remove(environment);
    if found.is_none() {
        debug!("Environment \"{}\" not found in database config", environment);
    }
    Ok(found)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = MigrateConfig::default();
        assert_eq!(config.migrations_dir, PathBuf::from("./migrations"));
        assert_eq!(config.databases_file, PathBuf::from("./database.json"));
        assert_eq!(config.environment, "default");
        assert_eq!(config.ledger_table, "migrations");
        assert!(!config.verbose);
    }

    #[test]
    fn test_load_database_config_json() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "database.json",
            r#"{
                "test": { "url": "sqlite://test.db", "adapter": "sqlite3" },
                "prod": "postgres://app@db/app"
            }"#,
        );

        let test = load_database_config(&path, "test").unwrap().unwrap();
        assert_eq!(test.url, "sqlite://test.db");
        assert_eq!(test.adapter.as_deref(), Some("sqlite3"));

        let prod = load_database_config(&path, "prod").unwrap().unwrap();
        assert_eq!(prod.adapter, None);
        assert_eq!(prod.adapter_name().unwrap(), "postgres");

        // Unknown environments are not an error
        assert!(load_database_config(&path, "not found").unwrap().is_none());
    }

    #[test]
    fn test_load_database_config_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "database.yml",
            "default:\n  url: mysql://root@localhost/app\n",
        );

        let config = load_database_config(&path, "default").unwrap().unwrap();
        assert_eq!(config.adapter_name().unwrap(), "mysql");
    }

    #[test]
    fn test_load_database_config_missing_or_broken() {
        let dir = TempDir::new().unwrap();

        let missing = dir.path().join("db_missing.json");
        assert!(matches!(
            load_database_config(&missing, "default"),
            Err(MigrateError::Configuration(_))
        ));

        let broken = write(&dir, "db_broken.json", "{ \"default\": ");
        assert!(matches!(
            load_database_config(&broken, "default"),
            Err(MigrateError::Configuration(_))
        ));
    }

    #[test]
    fn test_adapter_name_derivation() {
        assert_eq!(DatabaseConfig::new("sqlite::memory:").adapter_name().unwrap(), "sqlite3");
        assert_eq!(DatabaseConfig::new("postgresql://localhost/db").adapter_name().unwrap(), "postgres");
        assert_eq!(
            DatabaseConfig::new("whatever://x").with_adapter("mysql").adapter_name().unwrap(),
            "mysql"
        );
    }

    #[test]
    fn test_validate() {
        let dir = TempDir::new().unwrap();
        let databases = write(&dir, "database.json", "{}");

        let config = MigrateConfig::default()
            .with_migrations_dir(dir.path())
            .with_databases_file(&databases);
        assert!(config.validate().is_ok());

        let bad_dir = config.clone().with_migrations_dir(&databases);
        assert!(matches!(bad_dir.validate(), Err(MigrateError::Configuration(_))));

        let bad_table = config.clone().with_ledger_table("drop table; --");
        assert!(matches!(bad_table.validate(), Err(MigrateError::Configuration(_))));

        match config.database() {
            Err(MigrateError::Configuration(msg)) => assert!(msg.contains("default")),
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }
}
