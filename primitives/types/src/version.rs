//! Toolchain version representation.
//!
//! Package directories are named `<PackageName>.<version>`; the suffix is parsed
//! here so that versions compare numerically (`1.10.0` > `1.2.0`).
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed toolchain version.
///
/// Accepts `MAJOR.MINOR.PATCH` and `MAJOR.MINOR`, each with an optional `v` prefix.
/// Equality and ordering only look at the numeric components; the original string
/// is kept so the package directory name can be rebuilt exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainVersion {
    /// Original version string as found on disk or supplied by the caller.
    pub version_string: String,
    /// Major version component (e.g., `2` in `2.72.0`).
    pub major: u32,
    /// Minor version component (e.g., `72` in `2.72.0`).
    pub minor: u32,
    /// Patch component (e.g., `0` in `2.72.0`).
    pub patch: u32,
}

impl PartialEq for ToolchainVersion {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for ToolchainVersion {}

impl PartialOrd for ToolchainVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ToolchainVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

/// Errors that can occur while parsing versions.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionError {
    /// The provided string did not match the expected version format.
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
    /// A numeric component did not fit or the pattern failed to compile.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ToolchainVersion {
    /// Parse a `ToolchainVersion` from a string in the `[v]MAJOR.MINOR[.PATCH]` format.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let re = Regex::new(r"^(?:v)?(\d+)\.(\d+)(?:\.(\d+))?$")
            .map_err(|e: regex::Error| VersionError::Parse(e.to_string()))?;
        let caps = re.captures(s).ok_or_else(|| VersionError::InvalidFormat(s.to_string()))?;

        let component = |m: &str| {
            m.parse::<u32>().map_err(|e: std::num::ParseIntError| VersionError::Parse(e.to_string()))
        };

        Ok(Self {
            version_string: s.to_string(),
            major: component(&caps[1])?,
            minor: component(&caps[2])?,
            patch: caps.get(3).map(|m| component(m.as_str())).transpose()?.unwrap_or(0),
        })
    }

    /// Return the original version string.
    pub fn as_str(&self) -> &str { &self.version_string }

    /// Render as `MAJOR.MINOR.PATCH`, dropping any prefix.
    pub fn canonical(&self) -> String { format!("{}.{}.{}", self.major, self.minor, self.patch) }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.version_string) }
}

impl FromStr for ToolchainVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::parse(s) }
}
