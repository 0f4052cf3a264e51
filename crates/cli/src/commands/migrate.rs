use anydb_migrate::{
    create_migration, BatchReport, MigrateConfig, MigrateResult, MigrationDirection, MigrationState,
    Migrator, SqlxConnection,
};
use tracing::debug;

async fn connect(config: &MigrateConfig) -> MigrateResult<SqlxConnection> {
    config.validate()?;
    let database = config.database()?;
    debug!("Using environment \"{}\" ({})", config.environment, database.adapter_name()?);
    SqlxConnection::connect(&database).await
}

fn print_report(report: &BatchReport) {
    let verb = match report.direction {
        MigrationDirection::Up => "Applied",
        MigrationDirection::Down => "Reverted",
    };

    for name in &report.migrations {
        println!("{} migration: {}", verb, name);
    }

    if report.is_empty() {
        println!("Nothing to revert");
    } else {
        println!(
            "✅ {} {} migration(s) in {}ms",
            verb,
            report.migrations.len(),
            report.execution_time_ms
        );
    }
}

pub async fn apply(config: &MigrateConfig, name: &str) -> MigrateResult<()> {
    let conn = connect(config).await?;
    let result = Migrator::new(config, &conn).apply(name).await;
    conn.close().await;
    print_report(&result?);
    Ok(())
}

pub async fn revert(config: &MigrateConfig, name: &str) -> MigrateResult<()> {
    let conn = connect(config).await?;
    let result = Migrator::new(config, &conn).revert(name).await;
    conn.close().await;
    print_report(&result?);
    Ok(())
}

pub async fn up(config: &MigrateConfig, target: Option<&str>) -> MigrateResult<()> {
    let conn = connect(config).await?;
    let result = Migrator::new(config, &conn).up(target).await;
    conn.close().await;
    print_report(&result?);
    Ok(())
}

pub async fn down(config: &MigrateConfig, target: Option<&str>) -> MigrateResult<()> {
    let conn = connect(config).await?;
    let result = Migrator::new(config, &conn).down(target).await;
    conn.close().await;
    print_report(&result?);
    Ok(())
}

pub async fn status(config: &MigrateConfig) -> MigrateResult<()> {
    let conn = connect(config).await?;
    let result = Migrator::new(config, &conn).status().await;
    conn.close().await;
    let states = result?;

    println!("Migration Status:");
    println!("================");

    if states.is_empty() {
        println!("No migrations found");
        return Ok(());
    }

    for state in &states {
        match state {
            MigrationState::Applied { name, applied_at } => {
                println!("  ✅ {} (applied {})", name, applied_at.as_deref().unwrap_or("at unknown time"));
            }
            MigrationState::Pending { name } => println!("  ⏳ {}", name),
            MigrationState::Missing { name, .. } => println!("  ❌ {} (applied, file missing)", name),
        }
    }

    let pending = states
        .iter()
        .filter(|state| matches!(state, MigrationState::Pending { .. }))
        .count();
    println!("\n{} migration(s), {} pending", states.len(), pending);
    Ok(())
}

pub fn create(config: &MigrateConfig, name: &str) -> MigrateResult<()> {
    let path = create_migration(&config.migrations_dir, name)?;
    println!("Created migration: {}", path.display());
    Ok(())
}
