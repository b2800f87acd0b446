// SPDX-License-Identifier: CC0-1.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Proto synchronization and code generation pipeline.
//!
//! A run takes the configured entries through three stages:
//!
//! - `toolchain` - locate `protoc` and the gRPC plugin for a version
//! - `mirror` - copy `.proto` trees from source to destination
//! - `invoker` - run the compiler over each destination tree
//!
//! `orchestration` ties them together (`run`, `sync_all`).

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that abort a whole run.
///
/// Per-entry problems never show up here; they are recorded in the entry's
/// [`types::GenerationResult`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration lists no entries.
    #[error("No entries configured")]
    NoEntriesConfigured,
    /// No configuration file exists where one was required.
    #[error("Configuration not found: {}", .0.display())]
    ConfigurationNotFound(PathBuf),
    /// The toolchain could not be resolved.
    #[error("Toolchain not found: {0}")]
    ToolchainNotFound(#[from] toolchain::ToolchainError),
    /// The configuration exists but could not be read.
    #[error(transparent)]
    Config(config::ConfigError),
    /// A path could not be resolved.
    #[error(transparent)]
    Path(#[from] path::PathError),
}

impl From<config::ConfigError> for PipelineError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(path) => PipelineError::ConfigurationNotFound(path),
            other => PipelineError::Config(other),
        }
    }
}

// Module declarations
pub mod invoker;
pub mod mirror;
pub mod orchestration;
pub mod toolchain;

// Re-export public API
pub use invoker::{CodeGenInvoker, InvokeError};
pub use mirror::{find_proto_files, mirror, MirrorError};
pub use orchestration::{run, sync_all, PipelineSettings, RunSummary};
pub use toolchain::{ToolchainError, ToolchainResolver};
