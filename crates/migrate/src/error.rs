//! Error types for the migration engine
//!
//! Every engine operation returns [`MigrateResult`]; nothing in this crate
//! terminates the process. Callers decide how to surface failures.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Two files in the migrations directory map to the same version
    #[error(
        "more than one file specifies the migration for version {version} ({} and {})",
        first.display(),
        second.display()
    )]
    DuplicateVersion {
        version: i64,
        first: PathBuf,
        second: PathBuf,
    },

    /// The rollback target for a version can't be determined
    #[error("no previous version found for version {0}")]
    NoPreviousVersion(i64),

    /// The migrations directory holds no recognizable migration files
    #[error("no valid version found")]
    NoMigrations,

    /// A script could not be split into statements
    #[error("malformed migration script {}: {source}", path.display())]
    MalformedScript {
        path: PathBuf,
        #[source]
        source: ScriptError,
    },

    /// A statement that can't run inside a transaction was paired with others
    #[error(
        "query cannot run in a transaction, but was paired with other queries; \
         run it in isolation: {statement}"
    )]
    AmbiguousNonTransactionalMix { statement: String },

    /// A statement (or the ledger write guarding it) failed in the database
    #[error("FAIL {} ({source}), quitting migration", path.display())]
    ExecutionFailure {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    /// The ledger history holds no applied version at all
    #[error("version ledger is inconsistent: no applied version found")]
    LedgerInconsistency,

    /// The ledger table has not been created yet
    #[error("version table does not exist")]
    TableDoesNotExist,

    /// The run was cancelled between migrations
    #[error("migration run cancelled after {completed} migration(s)")]
    Cancelled { completed: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported driver '{0}'")]
    UnsupportedDriver(String),
}

impl MigrateError {
    pub(crate) fn execution(path: impl Into<PathBuf>, source: sqlx::Error) -> Self {
        MigrateError::ExecutionFailure {
            path: path.into(),
            source,
        }
    }
}

/// Structural problems found while splitting a script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("saw '-- +goose StatementBegin' with no matching '-- +goose StatementEnd'")]
    UnclosedStatementBlock,

    #[error("unexpected unfinished SQL query: {0}. Missing a semicolon?")]
    UnterminatedStatement(String),

    #[error("no Up/Down annotations found, so no statements were executed")]
    NoDirectionMarkers,
}

/// Reasons a file name is not a migration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileNameError {
    #[error("not a recognized migration file type")]
    UnrecognizedType,

    #[error("no separator found")]
    NoSeparator,

    #[error("invalid version number: {0}")]
    InvalidNumber(String),

    #[error("migration IDs must be greater than zero")]
    NonPositive,
}
