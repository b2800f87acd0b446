// SPDX-License-Identifier: CC0-1.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
//! Collection of utilities for the `protosync` command-line tool.

use std::path::{Path, PathBuf};

use pipeline::RunSummary;
use thiserror::Error;

/// Errors surfaced by `protosync` subcommands. Every one maps to exit status 1.
#[derive(Debug, Error)]
pub enum CliError {
    /// Pipeline-level failure (no entries, no toolchain, no configuration).
    #[error(transparent)]
    Pipeline(#[from] pipeline::PipelineError),
    /// Reading or writing the configuration failed.
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    /// Installing the logger failed.
    #[error(transparent)]
    Logging(#[from] logging::LoggingError),
    /// A standalone mirror failed.
    #[error(transparent)]
    Mirror(#[from] pipeline::MirrorError),
    /// A standalone generation could not run.
    #[error(transparent)]
    Invoke(#[from] pipeline::InvokeError),
    /// Path resolution failed.
    #[error(transparent)]
    Path(#[from] path::PathError),
    /// Summary serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The project root could not be determined.
    #[error("Invalid project root {}: {source}", path.display())]
    ProjectRoot {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying io error.
        source: std::io::Error,
    },
    /// Generation ran but failed.
    #[error("{0}")]
    Generation(types::EntryFailure),
    /// Some entries of a sync failed.
    #[error("{failed} of {total} {} failed", entries_word(*total))]
    EntriesFailed {
        /// Number of failed entries.
        failed: usize,
        /// Number of entries in the run.
        total: usize,
    },
}

/// Result type alias for `protosync` operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Absolute, canonical project root.
///
/// Uses `explicit` if given; otherwise the nearest ancestor of the current
/// directory holding a `protosync.toml`, falling back to the current directory.
pub fn resolve_project_root(explicit: Option<&Path>) -> Result<PathBuf> {
    let candidate = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|source| CliError::ProjectRoot { path: PathBuf::from("."), source })?;
            path::find_project_root(&cwd, config::CONFIG_FILE_NAME).unwrap_or(cwd)
        }
    };
    candidate.canonicalize().map_err(|source| CliError::ProjectRoot { path: candidate, source })
}

/// `"entry"` or `"entries"`.
pub fn entries_word(count: usize) -> &'static str {
    if count == 1 {
        "entry"
    } else {
        "entries"
    }
}

/// One-line human summary of a run.
pub fn format_summary(summary: &RunSummary) -> String {
    format!(
        "Copied {} proto file(s); generated {} of {} {}",
        summary.total_files_copied,
        summary.generated_count(),
        summary.results.len(),
        entries_word(summary.results.len())
    )
}

/// One line per failed entry, for stderr.
pub fn failure_lines(summary: &RunSummary) -> Vec<String> {
    summary
        .failures()
        .map(|result| match &result.failure {
            Some(failure) => format!("{}: {}", result.entry_name, failure),
            None => format!("{}: failed", result.entry_name),
        })
        .collect()
}
