use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Install the global `tracing` subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level when set. Fails if a
/// subscriber is already installed or the log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(config.log_level).into())
    });

    let file = match (&config.log_to_file, &config.log_file_path) {
        (true, Some(path)) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file: {e}")))?,
        ),
        _ => None,
    };

    let writer = match (config.log_to_console, file) {
        (true, Some(file)) => BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))),
        (false, Some(file)) => BoxMakeWriter::new(Mutex::new(file)),
        _ => BoxMakeWriter::new(std::io::stdout),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(true)
        .with_ansi(config.log_to_console && !config.log_to_file);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ProtocolError::ConfigError(format!("Failed to initialise logging: {e}")))?;

    info!(app = %config.app_name, level = %config.log_level, "Logging initialised");
    Ok(())
}
