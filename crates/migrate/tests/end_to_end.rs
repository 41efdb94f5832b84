use std::fs;
use std::path::Path;
use std::sync::Arc;

use gosling_migrate::backends::SqliteBackend;
use gosling_migrate::{
    DbConf, MigrateError, MigrationBackend, MigrationConfig, MigrationDirection, MigrationRunner,
    MigrationState,
};
use sqlx::Row;
use tempfile::TempDir;

const CREATE: &str = "-- +goose Up
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
INSERT INTO users (id, name) VALUES (1, 'ada');

-- +goose Down
DROP TABLE users;
";

const ALTER: &str = "-- +goose Up
ALTER TABLE users ADD COLUMN email TEXT;

-- +goose Down
-- +goose StatementBegin
CREATE TABLE users_backup AS SELECT id, name FROM users;
-- +goose StatementEnd
DROP TABLE users;
ALTER TABLE users_backup RENAME TO users;
";

fn write_migrations(dir: &Path) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("1_create.sql"), CREATE).unwrap();
    fs::write(dir.join("2_alter.sql"), ALTER).unwrap();
}

async fn columns(backend: &SqliteBackend) -> Vec<String> {
    sqlx::query("SELECT name FROM pragma_table_info('users') ORDER BY cid")
        .fetch_all(backend.pool())
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect()
}

async fn ledger(backend: &SqliteBackend) -> Vec<(i64, bool)> {
    backend
        .version_records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.version_id, r.is_applied))
        .collect()
}

#[tokio::test]
async fn test_up_down_redo_against_sqlite() {
    let dir = TempDir::new().unwrap();
    let migrations_dir = dir.path().join("migrations");
    write_migrations(&migrations_dir);

    let backend = SqliteBackend::in_memory("goose_db_version").await.unwrap();
    let runner = MigrationRunner::new(
        Arc::new(backend.clone()),
        MigrationConfig::new(&migrations_dir),
    );

    let result = runner.up().await.unwrap();
    assert_eq!(result.from_version, 0);
    assert_eq!(result.executed, vec![1, 2]);
    assert_eq!(runner.current_version().await.unwrap(), 2);
    assert_eq!(columns(&backend).await, vec!["id", "name", "email"]);
    assert_eq!(ledger(&backend).await, vec![(2, true), (1, true), (0, true)]);

    let result = runner.down().await.unwrap();
    assert_eq!(result.direction, MigrationDirection::Down);
    assert_eq!(result.executed, vec![2]);
    assert_eq!(runner.current_version().await.unwrap(), 1);
    assert_eq!(columns(&backend).await, vec!["id", "name"]);

    let passes = runner.redo().await.unwrap();
    assert_eq!(passes.len(), 2);
    assert_eq!(runner.current_version().await.unwrap(), 1);

    let name: String = sqlx::query("SELECT name FROM users WHERE id = 1")
        .fetch_one(backend.pool())
        .await
        .unwrap()
        .get("name");
    assert_eq!(name, "ada");

    let status = runner.status().await.unwrap();
    assert_eq!(status.len(), 2);
    assert!(matches!(status[0].state, MigrationState::Applied { applied_at: Some(_) }));
    assert_eq!(status[1].state, MigrationState::Pending);
}

#[tokio::test]
async fn test_failed_migration_leaves_earlier_versions_applied() {
    let dir = TempDir::new().unwrap();
    let migrations_dir = dir.path().join("migrations");
    write_migrations(&migrations_dir);
    fs::write(
        migrations_dir.join("3_broken.sql"),
        "-- +goose Up\nCREATE TABLE audit (id INTEGER);\nINSERT INTO missing_table VALUES (1);\n",
    )
    .unwrap();

    let backend = SqliteBackend::in_memory("goose_db_version").await.unwrap();
    let runner = MigrationRunner::new(
        Arc::new(backend.clone()),
        MigrationConfig::new(&migrations_dir),
    );

    match runner.up().await {
        Err(MigrateError::ExecutionFailure { path, .. }) => {
            assert_eq!(path, migrations_dir.join("3_broken.sql"));
        }
        other => panic!("expected execution failure, got {:?}", other),
    }

    assert_eq!(runner.current_version().await.unwrap(), 2);

    // the failed migration's first statement rolled back with it
    let audit = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'audit'",
    )
    .fetch_optional(backend.pool())
    .await
    .unwrap();
    assert!(audit.is_none());
}

#[tokio::test]
async fn test_dbconf_drives_a_file_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("db");
    write_migrations(&db.join("migrations"));

    let database = dir.path().join("app.db");
    fs::write(
        db.join("dbconf.yml"),
        format!(
            "development:\n    driver: sqlite3\n    open: sqlite://{}\n    table: versions\n",
            database.display()
        ),
    )
    .unwrap();

    let conf = DbConf::new(&db, "development", None).unwrap();
    let backend = conf.connect().await.unwrap();
    assert_eq!(backend.table(), "versions");

    let runner = MigrationRunner::new(backend.clone(), conf.migration_config());
    runner.up().await.unwrap();
    assert_eq!(runner.current_version().await.unwrap(), 2);
    backend.close().await;

    // a second connection sees the same ledger
    let backend = conf.connect().await.unwrap();
    let runner = MigrationRunner::new(backend, conf.migration_config());
    assert!(runner.up().await.unwrap().is_noop());
}
