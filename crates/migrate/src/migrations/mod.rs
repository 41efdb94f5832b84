//! Migration System
//!
//! Discovery, splitting, ordering and execution of versioned SQL migration
//! files, plus the version ledger that records what has been applied.

pub mod definitions;
pub mod ledger;
pub mod manager;
pub mod ordering;
pub mod runner;
pub mod splitter;
pub mod strategy;

pub use definitions::*;
pub use ledger::{create_version_table, ensure_db_version, latest_records, reconcile};
pub use manager::{collect_migrations, create_migration, parse_version, MigrationSet};
pub use ordering::order;
pub use runner::{migration_status, MigrationRunner};
pub use splitter::split_statements;
pub use strategy::{classify, TransactionStrategy};
