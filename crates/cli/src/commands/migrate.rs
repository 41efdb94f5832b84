//! Migration commands: up, down, redo, status, dbversion, create, print

use anyhow::Context;
use chrono::Utc;
use gosling_migrate::{
    create_migration, DbConf, MigrationRunResult, MigrationRunner, MigrationState, MigrationStatus,
};
use tokio_util::sync::CancellationToken;

use super::GlobalArgs;

async fn runner(conf: &DbConf, cancel: CancellationToken) -> anyhow::Result<MigrationRunner> {
    let backend = conf
        .connect()
        .await
        .with_context(|| format!("failed to connect to the '{}' database", conf.env))?;
    Ok(MigrationRunner::new(backend, conf.migration_config()).with_cancellation(cancel))
}

fn report(result: &MigrationRunResult) {
    if !result.is_noop() {
        tracing::debug!(
            "{} {} migration(s), version {} -> {}",
            result.direction,
            result.executed.len(),
            result.from_version,
            result.executed.last().copied().unwrap_or(result.target_version)
        );
    }
}

/// Migrate the database to the most recent version available
pub async fn up(args: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    let conf = args.db_conf()?;
    let runner = runner(&conf, cancel).await?;

    let result = runner.up().await;
    runner.backend().close().await;

    report(&result.context("failed to migrate up")?);
    Ok(())
}

/// Roll back the version by one
pub async fn down(args: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    let conf = args.db_conf()?;
    let runner = runner(&conf, cancel).await?;

    let result = runner.down().await;
    runner.backend().close().await;

    report(&result.context("failed to migrate down")?);
    Ok(())
}

/// Re-run the latest migration
pub async fn redo(args: &GlobalArgs, cancel: CancellationToken) -> anyhow::Result<()> {
    let conf = args.db_conf()?;
    let runner = runner(&conf, cancel).await?;

    let result = runner.redo().await;
    runner.backend().close().await;

    for pass in result.context("failed to redo the latest migration")? {
        report(&pass);
    }
    Ok(())
}

/// Dump the migration status for the current environment
pub async fn status(args: &GlobalArgs) -> anyhow::Result<()> {
    let conf = args.db_conf()?;
    let runner = runner(&conf, CancellationToken::new()).await?;

    let statuses = runner.status().await;
    runner.backend().close().await;
    let statuses = statuses.context("failed to read migration status")?;

    println!("gosling: status for environment '{}'", conf.env);
    println!("    Applied At                  Migration");
    println!("    =======================================");
    for status in &statuses {
        println!("    {}", status_line(status));
    }
    Ok(())
}

fn status_line(status: &MigrationStatus) -> String {
    let applied = match &status.state {
        MigrationState::Applied {
            applied_at: Some(at),
        } => at.format("%a %b %e %H:%M:%S %Y").to_string(),
        MigrationState::Applied { applied_at: None } => "Applied".to_string(),
        MigrationState::Pending => "Pending".to_string(),
    };
    format!("{:<24} -- {}", applied, status.migration.file_name())
}

/// Print the current version of the database
pub async fn dbversion(args: &GlobalArgs) -> anyhow::Result<()> {
    let conf = args.db_conf()?;
    let runner = runner(&conf, CancellationToken::new()).await?;

    let current = runner.current_version().await;
    runner.backend().close().await;

    println!(
        "gosling: dbversion {}",
        current.context("failed to read the database version")?
    );
    Ok(())
}

/// Create the scaffolding for a new migration
pub async fn create(args: &GlobalArgs, name: &str) -> anyhow::Result<()> {
    let conf = args.db_conf()?;

    let path = create_migration(name, &conf.migrations_dir, Utc::now())
        .with_context(|| format!("failed to create migration '{}'", name))?;
    let path = std::fs::canonicalize(&path).unwrap_or(path);

    println!("gosling: created {}", path.display());
    Ok(())
}

/// Print the resolved connection string
pub async fn print(args: &GlobalArgs) -> anyhow::Result<()> {
    let conf = args.db_conf()?;
    println!("{}", conf.open);
    Ok(())
}
