//! Database Backend Abstractions
//!
//! The migration engine supports PostgreSQL, MySQL and SQLite through the
//! traits in [`core`]; [`dialect`] holds the ledger SQL for each of them.

pub mod core;
pub mod dialect;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

pub use self::core::{MigrationBackend, MigrationTransaction};
pub use dialect::Dialect;
pub use mysql::MySqlBackend;
pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

use crate::error::MigrateResult;

/// Open a backend for `dialect`.
///
/// `search_path` only applies to PostgreSQL and is ignored elsewhere.
pub async fn connect(
    dialect: Dialect,
    url: &str,
    table: &str,
    search_path: Option<&str>,
) -> MigrateResult<Arc<dyn MigrationBackend>> {
    tracing::debug!("Opening {} migration backend (ledger table: {})", dialect, table);

    let backend: Arc<dyn MigrationBackend> = match dialect {
        Dialect::Postgres => Arc::new(PostgresBackend::connect(url, table, search_path).await?),
        Dialect::MySql => Arc::new(MySqlBackend::connect(url, table).await?),
        Dialect::Sqlite => Arc::new(SqliteBackend::connect(url, table).await?),
    };

    Ok(backend)
}
