// SPDX-License-Identifier: CC0-1.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Core data model for Protosync.
//!
//! Everything the pipeline passes between its stages lives here: the configured
//! [`Entry`] records, the resolved [`ToolchainInfo`], and the per-entry
//! [`GenerationResult`]. None of these types touch the filesystem.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Toolchain version representation and parsing
pub mod version;
/// Re-export the `ToolchainVersion` type for convenience.
pub use version::{ToolchainVersion, VersionError};

/// One synchronization unit: where `.proto` files come from, where they are
/// mirrored to, and where generated code goes.
///
/// Paths are kept as the user wrote them (absolute or relative to the project
/// root); resolution happens in the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Display label (e.g. "auth server"). Not unique, may be empty.
    #[serde(default)]
    pub name: String,
    /// Server-side `.proto` source directory.
    #[serde(default)]
    pub source_path: String,
    /// Client-side `.proto` destination directory.
    #[serde(default)]
    pub destination_path: String,
    /// Generated code directory. Empty means the configured default output.
    #[serde(default)]
    pub output_path: String,
}

impl Entry {
    /// Create a new entry.
    pub fn new(
        name: impl Into<String>,
        source_path: impl Into<String>,
        destination_path: impl Into<String>,
        output_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            output_path: output_path.into(),
        }
    }

    /// Check the entry invariant: source and destination must be non-empty.
    pub fn validate(&self) -> Result<(), EntryFailure> {
        let mut missing = Vec::new();
        if self.source_path.trim().is_empty() {
            missing.push("source_path");
        }
        if self.destination_path.trim().is_empty() {
            missing.push("destination_path");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EntryFailure::InvalidEntry(format!("empty {}", missing.join(" and "))))
        }
    }

    /// Label used in logs and reports; falls back to the source path when unnamed.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.source_path
        } else {
            &self.name
        }
    }
}

/// A resolved code-generator toolchain.
///
/// Built fresh for each pipeline run and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainInfo {
    /// Version string, exactly as used in the package directory name.
    pub version: String,
    /// The `<root>/<PackageName>.<version>` directory the binaries were found in.
    pub package_dir: PathBuf,
    /// Path to the compiler (`protoc`).
    pub compiler_binary_path: PathBuf,
    /// Path to the RPC plugin (`grpc_csharp_plugin`).
    pub plugin_binary_path: PathBuf,
    /// Include directories, in search order. At least one existed at resolution time.
    pub include_directories: Vec<PathBuf>,
}

/// Per-entry failure, recorded in that entry's [`GenerationResult`].
///
/// These never abort a batch; the remaining entries are still processed.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
pub enum EntryFailure {
    /// The entry is missing a required path.
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),
    /// A configured source or proto directory does not exist.
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// The directory exists but contains no `*.proto` files.
    #[error("No .proto files found in {}", .0.display())]
    NoProtoFiles(PathBuf),
    /// The generator ran and reported failure.
    #[error("Code generation failed (exit code {}): {}", exit_code_label(.exit_code), .stderr.trim())]
    GenerationFailed {
        /// Process exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },
    /// Filesystem or process-spawn error.
    #[error("I/O error: {0}")]
    Io(String),
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
}

/// Outcome of one entry's mirror + generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    /// Label of the entry this result belongs to.
    pub entry_name: String,
    /// Number of `.proto` files mirrored for this entry.
    pub files_copied: usize,
    /// Generator exit code; `None` if the generator never ran or was killed.
    pub exit_code: Option<i32>,
    /// Captured standard output of the generator.
    pub stdout: String,
    /// Captured standard error of the generator.
    pub stderr: String,
    /// `true` only when the generator exited 0 with empty standard error and
    /// no earlier step for this entry failed.
    pub succeeded: bool,
    /// First failure recorded for this entry.
    pub failure: Option<EntryFailure>,
}

impl GenerationResult {
    /// Build a result from a finished generator process.
    ///
    /// Any output on standard error counts as failure, even with exit code 0.
    pub fn from_process(exit_code: Option<i32>, stdout: String, stderr: String) -> Self {
        let succeeded = exit_code == Some(0) && stderr.is_empty();
        let failure = (!succeeded)
            .then(|| EntryFailure::GenerationFailed { exit_code, stderr: stderr.clone() });
        Self { exit_code, stdout, stderr, succeeded, failure, ..Default::default() }
    }

    /// Build a result for an entry that failed before (or instead of) generation.
    pub fn failed(failure: EntryFailure) -> Self {
        Self { failure: Some(failure), ..Default::default() }
    }

    /// Attach the entry label.
    pub fn with_entry_name(mut self, name: impl Into<String>) -> Self {
        self.entry_name = name.into();
        self
    }

    /// Record a failure that happened earlier for this entry (e.g. during mirroring).
    ///
    /// The earlier failure takes precedence and the result is marked failed.
    pub fn with_prior_failure(mut self, failure: EntryFailure) -> Self {
        self.succeeded = false;
        self.failure = Some(failure);
        self
    }
}
