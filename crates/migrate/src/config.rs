//! Database configuration loaded from `dbconf.yml`

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backends::{self, Dialect, MigrationBackend};
use crate::error::{MigrateError, MigrateResult};
use crate::migrations::definitions::{MigrationConfig, DEFAULT_VERSION_TABLE};

/// File name of the configuration inside the `--path` directory
pub const DBCONF_FILE: &str = "dbconf.yml";

/// Commented configuration written by `init`
pub const DBCONF_TEMPLATE: &str = "# Database configuration file.
#
# Example configurations (uncomment and modify as you see fit):
#
# development:
#     driver: postgres
#     open: postgres://mypguser@localhost/mydatabase?sslmode=disable
#
# cluster:
#     driver: mysql
#     open: $DATABASE_URL
#
# test:
#     driver: sqlite3
#     open: sqlite://db/test.db
#     migrations_dir: db/migrations
#     table: goose_db_version
";

static ENV_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))")
        .expect("valid environment variable pattern")
});

/// One environment entry of `dbconf.yml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub driver: String,
    pub open: String,
    #[serde(default)]
    pub migrations_dir: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
}

/// Resolved configuration for one environment
#[derive(Debug, Clone)]
pub struct DbConf {
    pub env: String,
    pub dialect: Dialect,
    /// Connection URL with environment variables expanded
    pub open: String,
    pub migrations_dir: PathBuf,
    pub table: String,
    pub pg_schema: Option<String>,
}

impl DbConf {
    /// Load `<path>/dbconf.yml` and resolve the `env` entry.
    pub fn new(path: impl AsRef<Path>, env: &str, pg_schema: Option<&str>) -> MigrateResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path.join(DBCONF_FILE))?;
        Self::from_yaml(&content, path, env, pg_schema)
    }

    /// Resolve the `env` entry of an already-read configuration
    pub fn from_yaml(
        content: &str,
        path: &Path,
        env: &str,
        pg_schema: Option<&str>,
    ) -> MigrateResult<Self> {
        let mut environments: HashMap<String, EnvironmentConfig> = serde_yaml::from_str(content)?;
        let entry = environments.remove(env).ok_or_else(|| {
            MigrateError::Config(format!("environment '{}' not found in {}", env, DBCONF_FILE))
        })?;

        let dialect: Dialect = entry.driver.parse()?;

        let open = expand_env(&entry.open);
        if open.trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "missing 'open' connection string for environment '{}'",
                env
            )));
        }

        let migrations_dir = match entry.migrations_dir {
            Some(dir) => PathBuf::from(expand_env(&dir)),
            None => path.join("migrations"),
        };

        let pg_schema = pg_schema
            .filter(|schema| !schema.is_empty())
            .map(str::to_string);
        if pg_schema.is_some() && dialect != Dialect::Postgres {
            tracing::warn!("--pgschema only applies to postgres; ignoring it for {}", dialect);
        }

        Ok(Self {
            env: env.to_string(),
            dialect,
            open,
            migrations_dir,
            table: entry.table.unwrap_or_else(|| DEFAULT_VERSION_TABLE.to_string()),
            pg_schema,
        })
    }

    pub fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::new(&self.migrations_dir).with_env(&self.env)
    }

    /// Open the backend this configuration describes
    pub async fn connect(&self) -> MigrateResult<Arc<dyn MigrationBackend>> {
        let search_path = match self.dialect {
            Dialect::Postgres => self.pg_schema.as_deref(),
            _ => None,
        };
        backends::connect(self.dialect, &self.open, &self.table, search_path).await
    }
}

/// Replace `$VAR` and `${VAR}` with their environment values; unset
/// variables expand to an empty string.
pub fn expand_env(value: &str) -> String {
    ENV_VAR
        .replace_all(value, |caps: &Captures| {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Write the configuration template to `<path>/dbconf.yml` unless one
/// already exists. Returns whether a file was written.
pub fn init(path: impl AsRef<Path>) -> MigrateResult<bool> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)?;

    let conf = path.join(DBCONF_FILE);
    if conf.exists() {
        return Ok(false);
    }

    std::fs::write(&conf, DBCONF_TEMPLATE)?;
    Ok(true)
}
