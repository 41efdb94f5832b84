//! Version Ledger - derives the current version from ledger history
//!
//! The ledger is append-only: every apply and every rollback inserts a row.
//! The most recent row for a version says whether it is applied, and the
//! newest version whose most recent row is an apply is the current version.

use std::collections::{HashMap, HashSet};

use crate::backends::MigrationBackend;
use crate::error::{MigrateError, MigrateResult};
use super::definitions::MigrationRecord;

/// Reconcile ledger rows, given most recent first, into the current version.
pub fn reconcile(records: &[MigrationRecord]) -> MigrateResult<i64> {
    let mut to_skip = HashSet::new();

    for record in records {
        if to_skip.contains(&record.version_id) {
            continue;
        }

        if record.is_applied {
            return Ok(record.version_id);
        }

        // latest state of this version is "rolled back"; older applies of
        // it must not count
        to_skip.insert(record.version_id);
    }

    Err(MigrateError::LedgerInconsistency)
}

/// Most recent row per version, from rows given most recent first
pub fn latest_records(records: &[MigrationRecord]) -> HashMap<i64, &MigrationRecord> {
    let mut latest = HashMap::new();
    for record in records {
        latest.entry(record.version_id).or_insert(record);
    }
    latest
}

/// Create the ledger table and insert the bootstrap row for version 0
pub async fn create_version_table(backend: &dyn MigrationBackend) -> MigrateResult<()> {
    let ddl = backend.dialect().create_version_table_sql(backend.table());
    let mut tx = backend.begin().await?;

    if let Err(err) = tx.execute(&ddl).await {
        if let Err(rollback_err) = tx.rollback().await {
            tracing::warn!("Failed to roll back version table creation: {}", rollback_err);
        }
        return Err(err.into());
    }

    if let Err(err) = tx.insert_version(0, true).await {
        if let Err(rollback_err) = tx.rollback().await {
            tracing::warn!("Failed to roll back version table creation: {}", rollback_err);
        }
        return Err(err.into());
    }

    tx.commit().await?;
    tracing::info!("Created version table {}", backend.table());
    Ok(())
}

/// Current version of the database, creating the ledger on first use
pub async fn ensure_db_version(backend: &dyn MigrationBackend) -> MigrateResult<i64> {
    match backend.version_records().await {
        Ok(records) => reconcile(&records),
        Err(MigrateError::TableDoesNotExist) => {
            create_version_table(backend).await?;
            Ok(0)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqliteBackend;

    fn rows(rows: &[(i64, bool)]) -> Vec<MigrationRecord> {
        rows.iter()
            .map(|(version, applied)| MigrationRecord::new(*version, *applied))
            .collect()
    }

    #[test]
    fn test_latest_row_shadows_older_apply() {
        let records = rows(&[(2, false), (2, true), (1, true)]);
        assert_eq!(reconcile(&records).unwrap(), 1);
    }

    #[test]
    fn test_reapplied_version_is_current() {
        let records = rows(&[(2, true), (2, false), (2, true), (1, true), (0, true)]);
        assert_eq!(reconcile(&records).unwrap(), 2);
    }

    #[test]
    fn test_rolled_back_to_bootstrap() {
        let records = rows(&[(1, false), (2, false), (2, true), (1, true), (0, true)]);
        assert_eq!(reconcile(&records).unwrap(), 0);
    }

    #[test]
    fn test_exhausted_history_is_inconsistent() {
        assert!(matches!(reconcile(&[]), Err(MigrateError::LedgerInconsistency)));
        assert!(matches!(
            reconcile(&rows(&[(3, false), (3, true)])),
            Err(MigrateError::LedgerInconsistency)
        ));
    }

    #[test]
    fn test_latest_records() {
        let records = rows(&[(2, false), (2, true), (1, true)]);
        let latest = latest_records(&records);
        assert_eq!(latest.len(), 2);
        assert!(!latest[&2].is_applied);
        assert!(latest[&1].is_applied);
    }

    #[tokio::test]
    async fn test_ensure_db_version_bootstraps_ledger() {
        let backend = SqliteBackend::in_memory("goose_db_version").await.unwrap();

        assert_eq!(ensure_db_version(&backend).await.unwrap(), 0);
        // second call reads the existing table instead of creating it again
        assert_eq!(ensure_db_version(&backend).await.unwrap(), 0);

        let records = backend.version_records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version_id, 0);
        assert!(records[0].is_applied);
    }

    #[tokio::test]
    async fn test_ensure_db_version_reads_history() {
        let backend = SqliteBackend::in_memory("goose_db_version").await.unwrap();
        ensure_db_version(&backend).await.unwrap();

        backend.insert_version(1, true).await.unwrap();
        backend.insert_version(2, true).await.unwrap();
        assert_eq!(ensure_db_version(&backend).await.unwrap(), 2);

        backend.insert_version(2, false).await.unwrap();
        assert_eq!(ensure_db_version(&backend).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_reported() {
        let backend = SqliteBackend::in_memory("custom_versions").await.unwrap();
        assert!(matches!(
            backend.version_records().await,
            Err(MigrateError::TableDoesNotExist)
        ));
    }
}
