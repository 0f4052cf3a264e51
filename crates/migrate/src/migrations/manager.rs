//! Migration Manager - File system operations for migrations
//!
//! Handles discovering, parsing, and creating migration files. A migration
//! file is a `*.sql` file directly inside the migrations directory with an
//! up section and a down section:
//!
//! ```sql
//! -- Up migration
//! CREATE TABLE users (id INTEGER, name TEXT);
//!
//! -- Down migration
//! DROP TABLE users;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlparser::tokenizer::{Location, Token, TokenWithLocation, Tokenizer};
use tracing::{debug, warn};

use super::catalog::Catalog;
use super::definitions::{migration_name, MigrationOperations, MigrationRecord, MIGRATION_EXTENSION};
use crate::backends::{Adapter, DatabaseTransaction};
use crate::error::{MigrateError, MigrateResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Up,
    Down,
}

fn section_marker(line: &str) -> Option<Section> {
    let comment = line.trim().strip_prefix("--")?.trim().to_ascii_lowercase();
    match comment.as_str() {
        "up" | "up migration" => Some(Section::Up),
        "down" | "down migration" => Some(Section::Down),
        _ => None,
    }
}

/// A migration defined by a SQL file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    up_sql: String,
    down_sql: String,
}

impl SqlMigration {
    /// Parse migration content into its UP and DOWN SQL.
    ///
    /// Returns `None` unless both section markers are present. Comment-only
    /// and blank lines inside a section are dropped.
    pub fn parse(content: &str) -> Option<Self> {
        let mut up_sql = Vec::new();
        let mut down_sql = Vec::new();
        let mut current = None;
        let mut seen_up = false;
        let mut seen_down = false;

        for line in content.lines() {
            if let Some(section) = section_marker(line) {
                match section {
                    Section::Up => seen_up = true,
                    Section::Down => seen_down = true,
                }
                current = Some(section);
                continue;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with("--") {
                continue;
            }

            match current {
                Some(Section::Up) => up_sql.push(line),
                Some(Section::Down) => down_sql.push(line),
                None => {} // Header before any section marker
            }
        }

        if !(seen_up && seen_down) {
            return None;
        }

        Some(Self {
            up_sql: up_sql.join("\n").trim().to_string(),
            down_sql: down_sql.join("\n").trim().to_string(),
        })
    }

    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }
}

async fn run_sql(tx: &mut dyn DatabaseTransaction, sql: &str) -> MigrateResult<()> {
    if sql.is_empty() {
        return Ok(());
    }

    let adapter = Adapter::parse(tx.adapter())?;
    for statement in split_sql_statements(sql, adapter) {
        tx.execute(&statement, &[]).await?;
    }
    Ok(())
}

#[async_trait]
impl MigrationOperations for SqlMigration {
    async fn up(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()> {
        run_sql(tx, &self.up_sql).await
    }

    async fn down(&self, tx: &mut dyn DatabaseTransaction) -> MigrateResult<()> {
        run_sql(tx, &self.down_sql).await
    }
}

/// Split SQL into statements at top-level semicolons, keeping each
/// statement's text exactly as written.
///
/// Semicolons inside string literals, comments, dollar-quoted bodies and
/// `BEGIN ... END` or `CASE ... END` blocks do not end a statement.
pub fn split_sql_statements(sql: &str, adapter: Adapter) -> Vec<String> {
    let dialect = adapter.dialect();
    let tokens = match Tokenizer::new(dialect.as_ref(), sql).tokenize_with_location() {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("SQL tokenizing failed, running section as a single statement: {}", e);
            let trimmed = sql.trim();
            return if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_string()]
            };
        }
    };

    let offsets = SourceOffsets::new(sql);
    let mut statements = Vec::new();
    let mut blocks = BlockDepth::default();
    let mut start = 0;
    let mut has_content = false;

    for (index, item) in tokens.iter().enumerate() {
        match &item.token {
            Token::Whitespace(_) => continue,
            Token::SemiColon if blocks.depth == 0 => {
                let end = offsets.byte_offset(&item.location) + 1;
                if has_content {
                    statements.push(sql[start..end].trim().to_string());
                }
                start = end;
                has_content = false;
                blocks = BlockDepth::default();
                continue;
            }
            Token::Word(word) if word.quote_style.is_none() => {
                blocks.visit(&word.value, next_word(&tokens[index + 1..]));
            }
            _ => {}
        }
        has_content = true;
    }

    let rest = sql[start..].trim();
    if has_content && !rest.is_empty() {
        statements.push(rest.to_string());
    }

    statements
}

/// Nesting of compound-statement blocks within the current statement
#[derive(Debug, Default)]
struct BlockDepth {
    depth: usize,
    creates: Option<bool>,
    previous: Option<String>,
}

impl BlockDepth {
    fn visit(&mut self, word: &str, next: Option<&str>) {
        let word = word.to_ascii_uppercase();
        // Only trigger, function and procedure bodies open a block with BEGIN
        let creates = *self.creates.get_or_insert(word == "CREATE");

        match word.as_str() {
            "BEGIN" if creates => self.depth += 1,
            "CASE" if self.previous.as_deref() != Some("END") => self.depth += 1,
            "END" if !next.map_or(false, closes_loop_or_branch) => {
                self.depth = self.depth.saturating_sub(1);
            }
            _ => {}
        }

        self.previous = Some(word);
    }
}

/// `END IF`, `END LOOP` and friends close blocks that were never counted
fn closes_loop_or_branch(word: &str) -> bool {
    ["IF", "LOOP", "WHILE", "REPEAT"]
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

fn next_word(tokens: &[TokenWithLocation]) -> Option<&str> {
    match tokens
        .iter()
        .map(|item| &item.token)
        .find(|token| !matches!(token, Token::Whitespace(_)))
    {
        Some(Token::Word(word)) => Some(word.value.as_str()),
        _ => None,
    }
}

/// Maps tokenizer line/column locations back to byte offsets
struct SourceOffsets<'a> {
    sql: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceOffsets<'a> {
    fn new(sql: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { sql, line_starts }
    }

    fn byte_offset(&self, location: &Location) -> usize {
        let line = (location.line as usize).saturating_sub(1);
        let column = (location.column as usize).saturating_sub(1);
        let line_start = self.line_starts.get(line).copied().unwrap_or(self.sql.len());

        self.sql[line_start..]
            .char_indices()
            .nth(column)
            .map_or(self.sql.len(), |(i, _)| line_start + i)
    }
}

/// Collect the migrations in `dir` (non-recursive).
///
/// Fails only when the directory cannot be listed. Files that cannot be read
/// or lack a section are skipped with a warning, so an existing directory
/// without valid migrations yields an empty catalog.
pub async fn collect_migrations(dir: &Path) -> MigrateResult<Catalog> {
    let discovery_error = |source| MigrateError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(discovery_error)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(discovery_error)? {
        let path = entry.path();
        if path.extension().map_or(false, |ext| ext == MIGRATION_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut catalog = Catalog::new();
    for path in paths {
        match load_migration_file(&path).await {
            Ok(Some(record)) => {
                debug!("Found migration {} at {}", record.name, path.display());
                if let Some(previous) = catalog.insert(record) {
                    warn!(
                        "Migration name {} from {} replaced by {}",
                        previous.name,
                        previous.source.display(),
                        path.display()
                    );
                }
            }
            Ok(None) => {
                warn!("File \"{}\" is not a valid migration, skipping", path.display());
            }
            Err(e) => {
                warn!("Error reading migration file \"{}\", skipping: {}", path.display(), e);
            }
        }
    }

    Ok(catalog)
}

async fn load_migration_file(path: &Path) -> MigrateResult<Option<MigrationRecord>> {
    if !tokio::fs::metadata(path).await?.is_file() {
        return Ok(None);
    }

    let content = tokio::fs::read_to_string(path).await?;
    let Some(migration) = SqlMigration::parse(&content) else {
        return Ok(None);
    };

    let name = migration_name(&path.to_string_lossy());
    Ok(Some(MigrationRecord::new(name, path, Arc::new(migration))))
}

/// Create a new, empty migration file and return its path
pub fn create_migration(dir: &Path, name: &str) -> MigrateResult<PathBuf> {
    let slug: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if slug.trim_matches('_').is_empty() {
        return Err(MigrateError::Configuration(format!(
            "invalid migration name \"{}\"",
            name
        )));
    }

    fs::create_dir_all(dir)?;

    let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
    let migration_id = format!("{}_{}", timestamp, slug);
    let path = dir.join(format!("{}.{}", migration_id, MIGRATION_EXTENSION));

    let template = create_migration_template(name, &migration_id);
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .and_then(|mut file| std::io::Write::write_all(&mut file, template.as_bytes()))?;

    Ok(path)
}

fn create_migration_template(name: &str, migration_id: &str) -> String {
    format!(
        "-- Migration: {}\n\
         -- ID: {}\n\
         -- Created: {}\n\n\
         -- Up migration\n\n\n\
         -- Down migration\n\n",
        name,
        migration_id,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
