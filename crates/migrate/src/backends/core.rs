//! Core Migration Backend Traits
//!
//! The engine talks to the database only through these traits. Each sqlx
//! driver gets one implementation; tests can supply their own.

use async_trait::async_trait;

use super::dialect::Dialect;
use crate::error::MigrateResult;
use crate::migrations::definitions::MigrationRecord;

/// A database the migration engine can run against
#[async_trait]
pub trait MigrationBackend: Send + Sync {
    /// SQL dialect of the ledger statements
    fn dialect(&self) -> Dialect;

    /// Name of the version ledger table
    fn table(&self) -> &str;

    /// Execute one statement outside of any transaction
    async fn execute(&self, sql: &str) -> Result<(), sqlx::Error>;

    /// Append a ledger row outside of any transaction
    async fn insert_version(&self, version: i64, applied: bool) -> Result<(), sqlx::Error>;

    /// All ledger rows, most recent first.
    ///
    /// Fails with [`MigrateError::TableDoesNotExist`](crate::MigrateError::TableDoesNotExist)
    /// when the ledger table hasn't been created yet.
    async fn version_records(&self) -> MigrateResult<Vec<MigrationRecord>>;

    /// Begin a transaction
    async fn begin(&self) -> MigrateResult<Box<dyn MigrationTransaction>>;

    /// Close the underlying pool
    async fn close(&self);
}

/// An open transaction on a [`MigrationBackend`]
#[async_trait]
pub trait MigrationTransaction: Send {
    /// Execute one statement within the transaction
    async fn execute(&mut self, sql: &str) -> Result<(), sqlx::Error>;

    /// Append a ledger row within the transaction
    async fn insert_version(&mut self, version: i64, applied: bool) -> Result<(), sqlx::Error>;

    async fn commit(self: Box<Self>) -> Result<(), sqlx::Error>;

    async fn rollback(self: Box<Self>) -> Result<(), sqlx::Error>;
}
