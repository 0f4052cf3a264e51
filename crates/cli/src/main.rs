mod commands;

use std::path::PathBuf;

use anydb_migrate::{MigrateConfig, MigrateResult};
use clap::{Parser, Subcommand};
use commands::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anydb-migrate")]
#[command(version, about = "Apply and revert ordered database migrations")]
struct Cli {
    /// Turn on verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for database migration files
    #[arg(short = 'm', long = "migrations", value_name = "PATH", default_value = "./migrations", global = true)]
    migrations: PathBuf,

    /// File with database environment definitions
    #[arg(short = 'd', long = "databases", value_name = "PATH", default_value = "./database.json", global = true)]
    databases: PathBuf,

    /// Environment to use
    #[arg(short = 'e', long = "environment", value_name = "ENV", default_value = "default", global = true)]
    environment: String,

    /// Table recording applied migrations
    #[arg(long = "table", value_name = "NAME", default_value = "migrations", global = true)]
    table: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a single migration
    Apply {
        /// Migration name, file name or path
        name: String,
    },

    /// Revert a single applied migration
    Revert {
        /// Migration name, file name or path
        name: String,
    },

    /// Apply pending migrations, up to and including NAME
    Up {
        /// Last migration to apply (defaults to the newest)
        name: Option<String>,
    },

    /// Revert applied migrations, down to and including NAME
    Down {
        /// Last migration to revert (defaults to the oldest)
        name: Option<String>,
    },

    /// Show applied and pending migrations
    Status,

    /// Create a new migration file
    Create {
        /// Migration name
        name: String,
    },
}

impl Cli {
    fn config(&self) -> MigrateConfig {
        MigrateConfig::default()
            .with_migrations_dir(&self.migrations)
            .with_databases_file(&self.databases)
            .with_environment(&self.environment)
            .with_ledger_table(&self.table)
            .with_verbose(self.verbose)
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Commands, config: &MigrateConfig) -> MigrateResult<()> {
    match command {
        Commands::Apply { name } => migrate::apply(config, &name).await?,
        Commands::Revert { name } => migrate::revert(config, &name).await?,
        Commands::Up { name } => migrate::up(config, name.as_deref()).await?,
        Commands::Down { name } => migrate::down(config, name.as_deref()).await?,
        Commands::Status => migrate::status(config).await?,
        Commands::Create { name } => migrate::create(config, &name)?,
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = cli.config();
    init_logging(config.verbose);

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
