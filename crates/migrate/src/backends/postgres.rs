//! PostgreSQL Backend Implementation
//!
//! PostgreSQL implementation of the migration backend traits using sqlx as
//! the underlying database driver.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Postgres, Row, Transaction};
use std::str::FromStr;

use super::core::{MigrationBackend, MigrationTransaction};
use super::dialect::Dialect;
use crate::error::{MigrateError, MigrateResult};
use crate::migrations::definitions::MigrationRecord;

/// PostgreSQL migration backend
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
    table: String,
    insert_sql: String,
    select_sql: String,
}

impl PostgresBackend {
    /// Connect to `url`, optionally pinning the session `search_path` to a
    /// schema.
    pub async fn connect(url: &str, table: &str, search_path: Option<&str>) -> MigrateResult<Self> {
        let mut options = PgConnectOptions::from_str(url)?;
        if let Some(schema) = search_path {
            options = options.options([("search_path", schema)]);
        }

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::Config(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self::from_pool(pool, table))
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: PgPool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
            insert_sql: Dialect::Postgres.insert_version_sql(table),
            select_sql: Dialect::Postgres.version_query_sql(table),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn record_from_row(row: &PgRow) -> MigrateResult<MigrationRecord> {
    let tstamp = row
        .try_get::<Option<NaiveDateTime>, _>("tstamp")
        .ok()
        .flatten();

    Ok(MigrationRecord {
        version_id: row.try_get("version_id")?,
        is_applied: row.try_get("is_applied")?,
        tstamp: tstamp.map(|t| DateTime::from_naive_utc_and_offset(t, Utc)),
    })
}

#[async_trait]
impl MigrationBackend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn table(&self) -> &str {
        &self.table
    }

    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error> {
        self.pool.execute(sql).await?;
        Ok(())
    }

    async fn insert_version(&self, version: i64, applied: bool) -> Result<(), sqlx::Error> {
        sqlx::query(&self.insert_sql)
            .bind(version)
            .bind(applied)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn version_records(&self) -> MigrateResult<Vec<MigrationRecord>> {
        let rows = match sqlx::query(&self.select_sql).fetch_all(&self.pool).await {
            Ok(rows) => rows,
            Err(err) if Dialect::Postgres.is_missing_table(&err) => {
                return Err(MigrateError::TableDoesNotExist)
            }
            Err(err) => return Err(err.into()),
        };

        rows.iter().map(record_from_row).collect()
    }

    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction {
            tx,
            insert_sql: self.insert_sql.clone(),
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open PostgreSQL transaction
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    insert_sql: String,
}

#[async_trait]
impl MigrationTransaction for PostgresTransaction {
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        (&mut *self.tx).execute(sql).await?;
        Ok(())
    }

    async fn insert_version(&mut self, version: i64, applied: bool) -> Result<(), sqlx::Error> {
        sqlx::query(&self.insert_sql)
            .bind(version)
            .bind(applied)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}
