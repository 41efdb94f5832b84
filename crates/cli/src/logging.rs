//! Logging setup for the CLI

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logging configuration derived from the command line
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub level: String,
    /// Emit one JSON object per event instead of plain text
    pub json_format: bool,
}

impl LoggingConfig {
    pub fn new(verbose: bool, json_format: bool) -> Self {
        Self {
            level: if verbose { "debug" } else { "info" }.to_string(),
            json_format,
        }
    }
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays pipeable.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    if config.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(Layer::new().with_writer(io::stderr).with_target(false).without_time())
            .try_init()?;
    }

    Ok(())
}
