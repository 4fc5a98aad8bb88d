//! Tracing setup with a level that can be changed at runtime

use crate::error::{ErrorType, Result, RoamError};
use crate::worker::LogControl;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Parse a level name or a 0..=4 verbosity (error..trace, higher clamps)
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    let level = level.trim();
    if let Ok(verbosity) = level.parse::<u32>() {
        return Ok(match verbosity {
            0 => LevelFilter::ERROR,
            1 => LevelFilter::WARN,
            2 => LevelFilter::INFO,
            3 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        });
    }

    match level.to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::OFF),
        "error" => Ok(LevelFilter::ERROR),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "info" => Ok(LevelFilter::INFO),
        "debug" => Ok(LevelFilter::DEBUG),
        "trace" => Ok(LevelFilter::TRACE),
        _ => Err(RoamError::new(
            ErrorType::Config,
            "BAD_LOG_LEVEL",
            format!("unknown log level '{level}'"),
        )),
    }
}

/// Handle on the installed filter
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> Result<()> {
        let level = parse_level(level)?;
        self.handle
            .reload(EnvFilter::new(level.to_string()))
            .map_err(|e| RoamError::new(ErrorType::Internal, "LOG_RELOAD", e.to_string()))?;
        tracing::info!(%level, "log level changed");
        Ok(())
    }

    /// Current filter directives
    #[cfg(test)]
    pub fn current(&self) -> Result<String> {
        self.handle
            .with_current(|filter| filter.to_string())
            .map_err(|e| RoamError::new(ErrorType::Internal, "LOG_RELOAD", e.to_string()))
    }
}

impl LogControl for LogHandle {
    fn set_level(&self, level: &str) -> Result<()> {
        LogHandle::set_level(self, level)
    }
}

/// Reloadable filter layer and its handle, not yet installed
pub fn filter_layer(default_level: &str) -> Result<(reload::Layer<EnvFilter, Registry>, LogHandle)> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(parse_level(default_level)?.to_string()),
    };
    let (layer, handle) = reload::Layer::new(filter);
    Ok((layer, LogHandle { handle }))
}

/// Install the global subscriber. Logs go to `log_file` when given (the
/// terminal front end owns the screen), otherwise to stderr.
pub fn init(default_level: &str, log_file: Option<&Path>) -> Result<LogHandle> {
    let (filter, handle) = filter_layer(default_level)?;

    let (writer, ansi) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .try_init()
        .map_err(|e| RoamError::new(ErrorType::Internal, "LOG_INIT", e.to_string()))?;

    Ok(handle)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
