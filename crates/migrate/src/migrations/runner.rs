//! Migration Runner - Executes migrations against the database
//!
//! Resolves the range between the current and the target version, orders
//! it, and runs each migration's statements with the strategy they call
//! for. Every migration commits on its own; the first failure stops the
//! run and leaves earlier migrations applied.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::definitions::{
    Migration, MigrationConfig, MigrationDirection, MigrationRunResult, MigrationState,
    MigrationStatus,
};
use super::ledger::{ensure_db_version, latest_records};
use super::manager::MigrationSet;
use super::ordering::order;
use super::splitter::split_statements;
use super::strategy::{classify, TransactionStrategy};
use crate::backends::{MigrationBackend, MigrationTransaction};
use crate::error::{MigrateError, MigrateResult};

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    backend: Arc<dyn MigrationBackend>,
    config: MigrationConfig,
    cancel: CancellationToken,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(backend: Arc<dyn MigrationBackend>, config: MigrationConfig) -> Self {
        Self {
            backend,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop runs between migrations once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn backend(&self) -> &Arc<dyn MigrationBackend> {
        &self.backend
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Scan the configured migrations directory
    pub fn load_migrations(&self) -> MigrateResult<MigrationSet> {
        MigrationSet::load(&self.config.migrations_dir)
    }

    /// Current database version, creating the ledger on first use
    pub async fn current_version(&self) -> MigrateResult<i64> {
        ensure_db_version(self.backend.as_ref()).await
    }

    /// Migrate from the current version to `target`.
    ///
    /// Fails with [`MigrateError::Io`] when the migrations directory is
    /// missing, instead of reporting nothing to run.
    pub async fn run_migrations(&self, target: i64) -> MigrateResult<MigrationRunResult> {
        let migrations = self.load_migrations()?;
        if !migrations.dir().is_dir() {
            return Err(MigrateError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("migrations directory {} not found", migrations.dir().display()),
            )));
        }
        self.run_to(&migrations, target).await
    }

    /// Migrate to the most recent version available
    pub async fn up(&self) -> MigrateResult<MigrationRunResult> {
        let migrations = self.load_migrations()?;
        let target = migrations.most_recent_version()?;
        self.run_to(&migrations, target).await
    }

    /// Roll back the most recently applied migration
    pub async fn down(&self) -> MigrateResult<MigrationRunResult> {
        let migrations = self.load_migrations()?;
        let current = self.current_version().await?;
        let previous = migrations.previous_version(current)?;
        self.run_to(&migrations, previous).await
    }

    /// Roll back the most recently applied migration, then apply it again
    pub async fn redo(&self) -> MigrateResult<Vec<MigrationRunResult>> {
        let migrations = self.load_migrations()?;
        let current = self.current_version().await?;
        let previous = migrations.previous_version(current)?;

        let rolled_back = self.run_to(&migrations, previous).await?;
        let reapplied = self.run_to(&migrations, current).await?;
        Ok(vec![rolled_back, reapplied])
    }

    /// Applied/pending state of every migration in the directory
    pub async fn status(&self) -> MigrateResult<Vec<MigrationStatus>> {
        let migrations = self.load_migrations()?;
        migration_status(self.backend.as_ref(), &migrations).await
    }

    async fn run_to(
        &self,
        migrations: &MigrationSet,
        target: i64,
    ) -> MigrateResult<MigrationRunResult> {
        let current = self.current_version().await?;
        let direction = MigrationDirection::between(current, target);
        let pending = order(migrations.collect(current, target), direction);

        let mut result = MigrationRunResult {
            from_version: current,
            target_version: target,
            direction,
            executed: Vec::with_capacity(pending.len()),
        };

        if pending.is_empty() {
            tracing::info!("No migrations to run. current version: {}", current);
            return Ok(result);
        }

        tracing::info!(
            "Migrating db environment '{}', current version: {}, target: {}",
            self.config.env,
            current,
            target
        );

        for migration in &pending {
            if self.cancel.is_cancelled() {
                tracing::warn!(
                    "Migration run cancelled before {}",
                    migration.file_name()
                );
                return Err(MigrateError::Cancelled {
                    completed: result.executed.len(),
                });
            }

            self.run_migration(migration, direction).await?;
            tracing::info!("OK    {}", migration.file_name());
            result.executed.push(migration.version);
        }

        Ok(result)
    }

    /// Run one migration script in `direction` and record it in the ledger
    async fn run_migration(
        &self,
        migration: &Migration,
        direction: MigrationDirection,
    ) -> MigrateResult<()> {
        let source = &migration.source;
        let script = tokio::fs::read_to_string(source).await?;

        let statements = split_statements(&script, direction).map_err(|e| {
            MigrateError::MalformedScript {
                path: source.clone(),
                source: e,
            }
        })?;

        match classify(&statements)? {
            TransactionStrategy::SingleNonTransactional => {
                self.run_outside_transaction(migration, &statements[0], direction).await
            }
            TransactionStrategy::Atomic => {
                self.run_in_transaction(migration, &statements, direction).await
            }
        }
    }

    async fn run_outside_transaction(
        &self,
        migration: &Migration,
        statement: &str,
        direction: MigrationDirection,
    ) -> MigrateResult<()> {
        tracing::debug!("Executing outside of a transaction: {}", statement.trim());
        self.backend
            .execute(statement)
            .await
            .map_err(|e| MigrateError::execution(&migration.source, e))?;

        // the statement has committed; a missing ledger row is only reported
        if let Err(err) = self
            .backend
            .insert_version(migration.version, direction.is_up())
            .await
        {
            tracing::warn!(
                "Executed single query {} but could not record version {} in {}: {}",
                statement.trim(),
                migration.version,
                self.backend.table(),
                err
            );
        }

        Ok(())
    }

    async fn run_in_transaction(
        &self,
        migration: &Migration,
        statements: &[String],
        direction: MigrationDirection,
    ) -> MigrateResult<()> {
        let mut tx = self.backend.begin().await?;

        for statement in statements {
            tracing::debug!("Executing: {}", statement.trim());
            if let Err(err) = tx.execute(statement).await {
                rollback(tx, &migration.source).await;
                return Err(MigrateError::execution(&migration.source, err));
            }
        }

        if let Err(err) = tx.insert_version(migration.version, direction.is_up()).await {
            rollback(tx, &migration.source).await;
            return Err(MigrateError::execution(&migration.source, err));
        }

        tx.commit()
            .await
            .map_err(|e| MigrateError::execution(&migration.source, e))
    }
}

/// Latest ledger state of every migration in `migrations`
pub async fn migration_status(
    backend: &dyn MigrationBackend,
    migrations: &MigrationSet,
) -> MigrateResult<Vec<MigrationStatus>> {
    ensure_db_version(backend).await?;

    let records = backend.version_records().await?;
    let latest = latest_records(&records);

    Ok(migrations
        .iter()
        .map(|migration| {
            let state = match latest.get(&migration.version) {
                Some(record) if record.is_applied => MigrationState::Applied {
                    applied_at: record.tstamp,
                },
                _ => MigrationState::Pending,
            };
            MigrationStatus {
                migration: migration.clone(),
                state,
            }
        })
        .collect())
}

async fn rollback(tx: Box<dyn MigrationTransaction>, source: &Path) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!("Failed to roll back {}: {}", source.display(), err);
    }
}
