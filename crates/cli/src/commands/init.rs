use anyhow::Context;
use gosling_migrate::config::{self, DBCONF_FILE};

use super::GlobalArgs;

/// Write a commented `dbconf.yml` into the `--path` directory
pub async fn run(args: &GlobalArgs) -> anyhow::Result<()> {
    let written = config::init(&args.path)
        .with_context(|| format!("failed to initialize {}", args.path.display()))?;

    let conf = args.path.join(DBCONF_FILE);
    if written {
        println!("gosling: created {}", conf.display());
    } else {
        println!("gosling: {} already exists", conf.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_keeps_existing_config() {
        let dir = TempDir::new().unwrap();
        let args = GlobalArgs {
            path: dir.path().join("db"),
            env: "development".to_string(),
            pg_schema: None,
        };

        run(&args).await.unwrap();
        let conf = args.path.join(DBCONF_FILE);
        assert_eq!(std::fs::read_to_string(&conf).unwrap(), config::DBCONF_TEMPLATE);

        std::fs::write(&conf, "development: {}\n").unwrap();
        run(&args).await.unwrap();
        assert_eq!(std::fs::read_to_string(&conf).unwrap(), "development: {}\n");
    }
}
