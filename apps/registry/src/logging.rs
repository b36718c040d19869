//! Tracing subscriber setup: console output, optional JSON, optional rolling file.

use crate::config::LoggingConfig;
use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for the lifetime of the
/// process. `RUST_LOG` takes precedence over `config.level`.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level '{}'", config.level))?;

    let mut layers = Vec::new();

    let console = fmt::layer().with_target(true);
    if config.json {
        layers.push(console.json().boxed());
    } else {
        layers.push(console.compact().boxed());
    }

    let guard = if config.file_enabled {
        std::fs::create_dir_all(&config.file_directory).with_context(|| {
            format!("Failed to create log directory {}", config.file_directory)
        })?;

        let file_appender = RollingFileAppender::builder()
            .rotation(parse_rotation(&config.file_rotation))
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .build(&config.file_directory)
            .context("Failed to create rolling log file")?;

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);
        if config.json {
            layers.push(file_layer.json().boxed());
        } else {
            layers.push(file_layer.boxed());
        }
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already installed")?;

    Ok(guard)
}

fn parse_rotation(value: &str) -> Rotation {
    match value {
        "hourly" => Rotation::HOURLY,
        "minutely" => Rotation::MINUTELY,
        "never" => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}
