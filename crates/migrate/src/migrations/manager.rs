//! Migration Manager - File system operations for migrations
//!
//! Handles discovering migration scripts in a directory, answering version
//! lookups over them, and creating new migration files.
//!
//! The directory is read once into a [`MigrationSet`]; range collection,
//! previous-version and most-recent lookups are all queries over that
//! in-memory set.

use chrono::{DateTime, Utc};
use std::collections::btree_map::{BTreeMap, Entry};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::definitions::Migration;
use crate::error::{FileNameError, MigrateError, MigrateResult};

/// Extension of the only migration type understood by the engine
pub const SQL_EXTENSION: &str = "sql";

/// Template written by [`create_migration`]
pub const SQL_MIGRATION_TEMPLATE: &str = "-- +goose Up
-- SQL in section 'Up' is executed when this migration is applied


-- +goose Down
-- SQL section 'Down' is executed when this migration is rolled back
";

/// Extract the version from a migration file name.
///
/// Migration scripts are named `<digits>_<description>.sql`; the digits
/// before the first underscore are the version and must be positive.
pub fn parse_version(path: &Path) -> Result<i64, FileNameError> {
    let base = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or(FileNameError::UnrecognizedType)?;

    if Path::new(base).extension().and_then(|ext| ext.to_str()) != Some(SQL_EXTENSION) {
        return Err(FileNameError::UnrecognizedType);
    }

    let idx = base.find('_').ok_or(FileNameError::NoSeparator)?;
    let prefix = &base[..idx];
    let version: i64 = prefix
        .parse()
        .map_err(|_| FileNameError::InvalidNumber(prefix.to_string()))?;

    if version <= 0 {
        return Err(FileNameError::NonPositive);
    }

    Ok(version)
}

/// Whether `version` lies in the half-open range a run from `current` to
/// `target` has to execute.
pub fn version_filter(version: i64, current: i64, target: i64) -> bool {
    if target > current {
        return version > current && version <= target;
    }

    if target < current {
        return version <= current && version > target;
    }

    false
}

/// All migrations found in one directory, ascending by version
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    dir: PathBuf,
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Scan `dir` for migration scripts.
    ///
    /// A missing directory yields an empty set. Symlinked scripts count as
    /// files; directories are skipped. Files that don't look like
    /// migrations are skipped; two files with the same version abort the
    /// scan with [`MigrateError::DuplicateVersion`].
    pub fn load(dir: impl AsRef<Path>) -> MigrateResult<Self> {
        let dir = dir.as_ref();
        if !dir.exists() {
            tracing::warn!("Migrations directory {} does not exist", dir.display());
            return Ok(Self {
                dir: dir.to_path_buf(),
                migrations: Vec::new(),
            });
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            // follows symlinks
            if fs::metadata(&path)?.is_file() {
                paths.push(path);
            }
        }

        Self::from_paths(dir, paths)
    }

    /// Build a set from already-listed paths
    pub fn from_paths<I>(dir: impl AsRef<Path>, paths: I) -> MigrateResult<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut paths: Vec<PathBuf> = paths.into_iter().collect();
        paths.sort();

        let mut by_version: BTreeMap<i64, PathBuf> = BTreeMap::new();
        for path in paths {
            let version = match parse_version(&path) {
                Ok(version) => version,
                Err(reason) => {
                    tracing::trace!("Skipping {}: {}", path.display(), reason);
                    continue;
                }
            };

            match by_version.entry(version) {
                Entry::Occupied(existing) => {
                    return Err(MigrateError::DuplicateVersion {
                        version,
                        first: existing.get().clone(),
                        second: path,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(path);
                }
            }
        }

        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
            migrations: by_version
                .into_iter()
                .map(|(version, path)| Migration::new(version, path))
                .collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter()
    }

    pub fn contains(&self, version: i64) -> bool {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .is_ok()
    }

    /// Migrations a run from `current` to `target` has to execute.
    ///
    /// The result is unordered as far as callers are concerned; use
    /// [`order`](super::ordering::order) before executing.
    pub fn collect(&self, current: i64, target: i64) -> Vec<Migration> {
        self.migrations
            .iter()
            .filter(|m| version_filter(m.version, current, target))
            .cloned()
            .collect()
    }

    /// The version to roll back to from `version`.
    ///
    /// Returns the highest version below `version`, or `0` when `version`
    /// is the oldest migration in the directory.
    pub fn previous_version(&self, version: i64) -> MigrateResult<i64> {
        let previous = self
            .migrations
            .iter()
            .map(|m| m.version)
            .filter(|v| *v < version)
            .max();

        match previous {
            Some(previous) => Ok(previous),
            None if self.contains(version) => Ok(0),
            None => Err(MigrateError::NoPreviousVersion(version)),
        }
    }

    /// Highest version available in the directory
    pub fn most_recent_version(&self) -> MigrateResult<i64> {
        self.migrations
            .last()
            .map(|m| m.version)
            .ok_or(MigrateError::NoMigrations)
    }
}

/// Collect the migrations in `dir` a run from `current` to `target` needs.
///
/// Set `current` to 0 and `target` to `i64::MAX` to collect everything.
pub fn collect_migrations(
    dir: impl AsRef<Path>,
    current: i64,
    target: i64,
) -> MigrateResult<Vec<Migration>> {
    Ok(MigrationSet::load(dir)?.collect(current, target))
}

/// Create a new migration file in `dir` and return its path.
///
/// The file is named `<YYYYMMDDHHMMSS>_<name>.sql` after `time`; an
/// existing file is never overwritten.
pub fn create_migration(
    name: &str,
    dir: impl AsRef<Path>,
    time: DateTime<Utc>,
) -> MigrateResult<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MigrateError::Config(
            "migration name must not be empty".to_string(),
        ));
    }

    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let timestamp = time.format("%Y%m%d%H%M%S");
    let slug = name.split_whitespace().collect::<Vec<_>>().join("_");
    let path = dir.join(format!("{}_{}.{}", timestamp, slug, SQL_EXTENSION));

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)?;
    file.write_all(SQL_MIGRATION_TEMPLATE.as_bytes())?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "-- +goose Up\n").unwrap();
    }

    #[test]
    fn test_parse_version_accepts_migration_names() {
        assert_eq!(parse_version(Path::new("1_create.sql")), Ok(1));
        assert_eq!(
            parse_version(Path::new("db/migrations/20240101120000_add_users.sql")),
            Ok(20240101120000)
        );
        assert_eq!(parse_version(Path::new("0042_with_many_parts.sql")), Ok(42));
    }

    #[test]
    fn test_parse_version_rejects_other_files() {
        assert_eq!(parse_version(Path::new("1_create.go")), Err(FileNameError::UnrecognizedType));
        assert_eq!(parse_version(Path::new("README")), Err(FileNameError::UnrecognizedType));
        assert_eq!(parse_version(Path::new("create.sql")), Err(FileNameError::NoSeparator));
        assert_eq!(parse_version(Path::new("0_init.sql")), Err(FileNameError::NonPositive));
        assert_eq!(parse_version(Path::new("-3_init.sql")), Err(FileNameError::NonPositive));
        assert_eq!(
            parse_version(Path::new("abc_init.sql")),
            Err(FileNameError::InvalidNumber("abc".to_string()))
        );
    }

    #[test]
    fn test_version_filter() {
        for v in [1, 2, 3] {
            assert!(version_filter(v, 0, 3));
        }
        for v in [0, 4] {
            assert!(!version_filter(v, 0, 3));
        }

        for v in [3, 4, 5] {
            assert!(version_filter(v, 5, 2));
        }
        for v in [1, 2, 6] {
            assert!(!version_filter(v, 5, 2));
        }

        for v in 0..10 {
            assert!(!version_filter(v, 4, 4));
        }
    }

    #[test]
    fn test_load_skips_unrelated_files() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "1_create.sql");
        touch(temp_dir.path(), "2_alter.sql");
        touch(temp_dir.path(), "notes.txt");
        touch(temp_dir.path(), "0_bad.sql");
        fs::create_dir(temp_dir.path().join("3_nested.sql")).unwrap();

        let set = MigrationSet::load(temp_dir.path()).unwrap();
        let versions: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
    }

    #[cfg(unix)]
    #[test]
    fn test_load_follows_symlinked_scripts() {
        let temp_dir = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        touch(temp_dir.path(), "1_a.sql");
        touch(shared.path(), "b.sql");
        std::os::unix::fs::symlink(shared.path().join("b.sql"), temp_dir.path().join("2_b.sql"))
            .unwrap();

        let set = MigrationSet::load(temp_dir.path()).unwrap();
        let versions: Vec<i64> = set.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(set.most_recent_version().unwrap(), 2);
        assert_eq!(set.previous_version(2).unwrap(), 1);
    }

    #[test]
    fn test_load_missing_directory_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let set = MigrationSet::load(temp_dir.path().join("missing")).unwrap();
        assert!(set.is_empty());
        assert!(matches!(set.most_recent_version(), Err(MigrateError::NoMigrations)));
    }

    #[test]
    fn test_duplicate_versions_abort_collection() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "1_create.sql");
        touch(temp_dir.path(), "5_one.sql");
        touch(temp_dir.path(), "005_two.sql");

        // the duplicate lies outside the requested range and still aborts
        match collect_migrations(temp_dir.path(), 0, 1) {
            Err(MigrateError::DuplicateVersion { version, .. }) => assert_eq!(version, 5),
            other => panic!("expected duplicate version error, got {:?}", other),
        }
    }

    #[test]
    fn test_collect_applies_range() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["1_a.sql", "2_b.sql", "3_c.sql", "4_d.sql", "5_e.sql", "6_f.sql"] {
            touch(temp_dir.path(), name);
        }

        let set = MigrationSet::load(temp_dir.path()).unwrap();
        let mut up: Vec<i64> = set.collect(0, 3).iter().map(|m| m.version).collect();
        up.sort();
        assert_eq!(up, vec![1, 2, 3]);

        let mut down: Vec<i64> = set.collect(5, 2).iter().map(|m| m.version).collect();
        down.sort();
        assert_eq!(down, vec![3, 4, 5]);

        assert!(set.collect(4, 4).is_empty());
    }

    #[test]
    fn test_previous_version() {
        let set = MigrationSet::from_paths(
            "db/migrations",
            ["10_a.sql", "20_b.sql", "30_c.sql"].iter().map(PathBuf::from),
        )
        .unwrap();

        assert_eq!(set.previous_version(30).unwrap(), 20);
        assert_eq!(set.previous_version(25).unwrap(), 20);
        assert_eq!(set.previous_version(10).unwrap(), 0);
        assert!(matches!(set.previous_version(5), Err(MigrateError::NoPreviousVersion(5))));
        assert!(matches!(set.previous_version(0), Err(MigrateError::NoPreviousVersion(0))));
    }

    #[test]
    fn test_most_recent_version() {
        let set = MigrationSet::from_paths(
            "db/migrations",
            ["3_c.sql", "1_a.sql", "12_b.sql", "99_x.txt"].iter().map(PathBuf::from),
        )
        .unwrap();
        assert_eq!(set.most_recent_version().unwrap(), 12);
    }

    #[test]
    fn test_create_migration() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");
        let time = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let path = create_migration("add users", &dir, time).unwrap();
        assert_eq!(path, dir.join("20240309140507_add_users.sql"));
        assert_eq!(parse_version(&path), Ok(20240309140507));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("-- +goose Up\n"));
        assert!(content.contains("-- +goose Down\n"));

        // same second, same name: refuse to clobber
        assert!(matches!(create_migration("add users", &dir, time), Err(MigrateError::Io(_))));
        assert!(matches!(create_migration("  ", &dir, time), Err(MigrateError::Config(_))));
    }
}
