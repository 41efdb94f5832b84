pub mod init;
pub mod migrate;

use anyhow::Context as _;
use gosling_migrate::DbConf;
use std::path::PathBuf;

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding `dbconf.yml`
    pub path: PathBuf,
    pub env: String,
    pub pg_schema: Option<String>,
}

impl GlobalArgs {
    pub fn db_conf(&self) -> anyhow::Result<DbConf> {
        DbConf::new(&self.path, &self.env, self.pg_schema.as_deref()).with_context(|| {
            format!(
                "failed to load environment '{}' from {}",
                self.env,
                self.path.join(gosling_migrate::config::DBCONF_FILE).display()
            )
        })
    }
}
