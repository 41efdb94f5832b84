//! Migration Definitions - Core types shared by the migration engine
//!
//! Defines the migration descriptor, the ledger record, the run direction
//! and the configuration value threaded through every entry point.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default name of the version ledger table
pub const DEFAULT_VERSION_TABLE: &str = "goose_db_version";

/// A migration script discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Version parsed from the file name, always positive
    pub version: i64,
    /// Next version in the current ordering pass
    pub next: Option<i64>,
    /// Previous version in the current ordering pass
    pub previous: Option<i64>,
    /// Path to the `.sql` script
    pub source: PathBuf,
}

impl Migration {
    pub fn new(version: i64, source: impl Into<PathBuf>) -> Self {
        Self {
            version,
            next: None,
            previous: None,
            source: source.into(),
        }
    }

    /// File name of the script, for log output
    pub fn file_name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// One row of the version ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub version_id: i64,
    pub tstamp: Option<DateTime<Utc>>,
    /// Whether the row was written by an apply (`true`) or a rollback
    pub is_applied: bool,
}

impl MigrationRecord {
    pub fn new(version_id: i64, is_applied: bool) -> Self {
        Self {
            version_id,
            tstamp: None,
            is_applied,
        }
    }
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationDirection {
    /// Apply the migration (run Up sections)
    Up,
    /// Roll back the migration (run Down sections)
    Down,
}

impl MigrationDirection {
    /// Direction needed to move the database from `current` to `target`
    pub fn between(current: i64, target: i64) -> Self {
        if current < target {
            MigrationDirection::Up
        } else {
            MigrationDirection::Down
        }
    }

    /// Value written to the ledger's `is_applied` column
    pub fn is_up(self) -> bool {
        matches!(self, MigrationDirection::Up)
    }
}

impl fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Configuration for the migration engine
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Environment name, used in log output only
    pub env: String,
}

impl MigrationConfig {
    pub fn new(migrations_dir: impl AsRef<Path>) -> Self {
        Self {
            migrations_dir: migrations_dir.as_ref().to_path_buf(),
            env: "development".to_string(),
        }
    }

    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = env.into();
        self
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new("db/migrations")
    }
}

/// Result of a resolve-and-run operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Version the database was at before the run
    pub from_version: i64,
    /// Version the run was asked to reach
    pub target_version: i64,
    pub direction: MigrationDirection,
    /// Versions whose scripts ran, in execution order
    pub executed: Vec<i64>,
}

impl MigrationRunResult {
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Migration status as derived from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// No ledger row, or the latest row is a rollback
    Pending,
    /// The latest ledger row applied this version
    Applied { applied_at: Option<DateTime<Utc>> },
}

/// Status line for one migration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub migration: Migration,
    pub state: MigrationState,
}
