//! Ledger SQL per database dialect

use std::fmt;
use std::str::FromStr;

use crate::error::MigrateError;

/// SQL dialect of a migration backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// DDL creating the version ledger table
    pub fn create_version_table_sql(&self, table: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::MySql => format!(
                "CREATE TABLE {} (\n    \
                    id serial NOT NULL,\n    \
                    version_id bigint NOT NULL,\n    \
                    is_applied boolean NOT NULL,\n    \
                    tstamp timestamp NULL default now(),\n    \
                    PRIMARY KEY(id)\n\
                );",
                table
            ),
            Dialect::Sqlite => format!(
                "CREATE TABLE {} (\n    \
                    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    \
                    version_id INTEGER NOT NULL,\n    \
                    is_applied INTEGER NOT NULL,\n    \
                    tstamp TIMESTAMP DEFAULT (datetime('now'))\n\
                );",
                table
            ),
        }
    }

    /// DML appending one ledger row; binds `(version_id, is_applied)`
    pub fn insert_version_sql(&self, table: &str) -> String {
        match self {
            Dialect::Postgres => format!(
                "INSERT INTO {} (version_id, is_applied) VALUES ($1, $2)",
                table
            ),
            Dialect::MySql | Dialect::Sqlite => format!(
                "INSERT INTO {} (version_id, is_applied) VALUES (?, ?)",
                table
            ),
        }
    }

    /// Query returning every ledger row, most recent first
    pub fn version_query_sql(&self, table: &str) -> String {
        format!(
            "SELECT version_id, is_applied, tstamp FROM {} ORDER BY id DESC",
            table
        )
    }

    /// Whether `err` means the queried table doesn't exist
    pub fn is_missing_table(&self, err: &sqlx::Error) -> bool {
        let sqlx::Error::Database(db_err) = err else {
            return false;
        };

        match self {
            Dialect::Postgres => db_err.code().as_deref() == Some("42P01"),
            Dialect::MySql => {
                db_err.code().as_deref() == Some("42S02")
                    || db_err.message().contains("doesn't exist")
            }
            Dialect::Sqlite => db_err.message().contains("no such table"),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::MySql => write!(f, "mysql"),
            Dialect::Sqlite => write!(f, "sqlite3"),
        }
    }
}

impl FromStr for Dialect {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" | "mymysql" => Ok(Dialect::MySql),
            "sqlite3" | "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(MigrateError::UnsupportedDriver(s.to_string())),
        }
    }
}
