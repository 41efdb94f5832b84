//! SQLite Backend Implementation
//!
//! SQLite implementation of the migration backend traits. The pool is held
//! at a single connection that never expires, so `sqlite::memory:`
//! databases survive for the lifetime of the backend.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, Transaction};
use std::str::FromStr;

use super::core::{MigrationBackend, MigrationTransaction};
use super::dialect::Dialect;
use crate::error::{MigrateError, MigrateResult};
use crate::migrations::definitions::MigrationRecord;

/// SQLite migration backend
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    table: String,
    insert_sql: String,
    select_sql: String,
}

impl SqliteBackend {
    /// Open the database at `url`, creating the file if needed
    pub async fn connect(url: &str, table: &str) -> MigrateResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::Config(format!("Failed to open SQLite database: {}", e)))?;

        Ok(Self::from_pool(pool, table))
    }

    /// A private in-memory database
    pub async fn in_memory(table: &str) -> MigrateResult<Self> {
        Self::connect("sqlite::memory:", table).await
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool, table: &str) -> Self {
        Self {
            pool,
            table: table.to_string(),
            insert_sql: Dialect::Sqlite.insert_version_sql(table),
            select_sql: Dialect::Sqlite.version_query_sql(table),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &SqliteRow) -> MigrateResult<MigrationRecord> {
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
impl MigrationBackend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
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
            Err(err) if Dialect::Sqlite.is_missing_table(&err) => {
                return Err(MigrateError::TableDoesNotExist)
            }
            Err(err) => return Err(err.into()),
        };

        rows.iter().map(record_from_row).collect()
    }

    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction {
            tx,
            insert_sql: self.insert_sql.clone(),
        }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Open SQLite transaction
pub struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
    insert_sql: String,
}

#[async_trait]
impl MigrationTransaction for SqliteTransaction {
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
