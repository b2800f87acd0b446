// SPDX-License-Identifier: CC0-1.0

//! Protosync umbrella crate.
//!
//! Re-exports the workspace members so a host (an editor plugin, a build script,
//! the `protosync` CLI) can depend on one crate and reach the two top-level
//! operations: "sync all + generate" ([`pipeline::run`]) and "create default
//! configuration" ([`config::Config::create_default`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]
#![doc(test(attr(warn(unused))))]

pub use {config, path, pipeline, types};

/// Miscellaneous metadata about the Protosync workspace.
pub mod protosync_meta {
    /// Version string for the umbrella crate, as reported by Cargo.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
