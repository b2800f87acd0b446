// SPDX-License-Identifier: CC0-1.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Logging setup for Protosync binaries.
//!
//! Library crates only emit `tracing` events; this crate installs the subscriber
//! that decides where they go. `RUST_LOG` takes precedence over the configured level.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Default filter directive, e.g. `info` or `protosync=debug`.
    pub level: String,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self { Self { level: "info".to_string(), file: None } }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level string is not a valid filter directive.
    #[error("Invalid log level '{level}': {source}")]
    InvalidLevel {
        /// The rejected directive.
        level: String,
        /// Parser error.
        source: tracing_subscriber::filter::ParseError,
    },
    /// The log file could not be opened.
    #[error("Failed to open log file {}: {source}", path.display())]
    File {
        /// Path of the log file.
        path: PathBuf,
        /// Underlying io error.
        source: std::io::Error,
    },
}

/// Build the filter: `RUST_LOG` if set and valid, otherwise `level`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level)
        .map_err(|source| LoggingError::InvalidLevel { level: level.to_string(), source })
}

/// Install the global subscriber.
///
/// A second call leaves the first subscriber in place and returns `Ok`.
pub fn init(settings: &LogSettings) -> Result<(), LoggingError> {
    let filter = build_filter(&settings.level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File { path: path.clone(), source })?;
            let _ = builder.with_ansi(false).with_writer(Mutex::new(file)).try_init();
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
    Ok(())
}
