mod commands;
mod logging;

use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "gosling")]
#[command(version)]
#[command(about = "Versioned SQL migrations for PostgreSQL, MySQL and SQLite")]
struct Cli {
    /// Folder containing db info
    #[arg(long, global = true, default_value = "db")]
    path: PathBuf,

    /// Which DB environment to use
    #[arg(long, global = true, default_value = "development")]
    env: String,

    /// Which postgres schema to migrate
    #[arg(long, global = true)]
    pgschema: Option<String>,

    /// Log executed statements
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate the DB to the most recent version available
    Up,

    /// Roll back the version by 1
    Down,

    /// Re-run the latest migration
    Redo,

    /// Dump the migration status for the current DB
    Status,

    /// Create the scaffolding for a new migration
    Create {
        /// Migration name
        name: String,
    },

    /// Print the current version of the database
    Dbversion,

    /// Print the connection string of the current environment
    Print,

    /// Create the db folder with a template dbconf.yml
    Init,
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping after the current migration");
            child.cancel();
        }
    });

    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&logging::LoggingConfig::new(cli.verbose, cli.json_logs))?;

    let args = GlobalArgs {
        path: cli.path,
        env: cli.env,
        pg_schema: cli.pgschema,
    };

    match cli.command {
        Commands::Up => migrate::up(&args, cancel_on_ctrl_c()).await?,
        Commands::Down => migrate::down(&args, cancel_on_ctrl_c()).await?,
        Commands::Redo => migrate::redo(&args, cancel_on_ctrl_c()).await?,
        Commands::Status => migrate::status(&args).await?,
        Commands::Create { name } => migrate::create(&args, &name).await?,
        Commands::Dbversion => migrate::dbversion(&args).await?,
        Commands::Print => migrate::print(&args).await?,
        Commands::Init => init::run(&args).await?,
    }

    Ok(())
}
