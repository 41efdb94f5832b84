//! # gosling-migrate: Versioned SQL migrations
//!
//! Discovers `<version>_<name>.sql` files in a migrations directory, splits
//! their `-- +goose Up` / `-- +goose Down` sections into statements, and
//! runs them against PostgreSQL, MySQL or SQLite through sqlx, keeping an
//! append-only version ledger table in the database.
//!
//! A run moves the database from its current version to a target version,
//! one migration at a time; each migration commits on its own.

pub mod backends;
pub mod config;
pub mod error;
pub mod migrations;

pub use backends::{Dialect, MigrationBackend, MigrationTransaction};
pub use config::DbConf;
pub use error::*;
pub use migrations::*;
