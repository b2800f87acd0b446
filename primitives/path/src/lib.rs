// SPDX-License-Identifier: CC0-1.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Path resolution for configured entry paths.
//!
//! Pure path algebra: turning project-relative paths into absolute ones, and
//! computing the `/`-separated relative path of a file under a base directory so
//! mirrored trees keep their structure on every platform. The only function
//! here that touches the filesystem is [`find_project_root`].

pub mod path_utils;

// Re-export for convenience
pub use path_utils::*;
