// SPDX-License-Identifier: CC0-1.0

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

//! Protosync Configuration
//!
//! This crate provides the configuration store for Protosync.
//! A project keeps one `protosync.toml` at its root that specifies:
//! - The ordered list of sync entries (source / destination / output paths)
//! - Where to look for the code-generator toolchain and which version to pin
//! - Code generation parameters (target language, default output directory)
//! - Logging configuration
//!
//! The pipeline only ever reads this configuration; creating the default file is
//! idempotent and never overwrites an existing one.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Entry;

/// File name of the configuration, looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "protosync.toml";

/// Default toolchain package name (NuGet `Grpc.Tools` layout).
pub const DEFAULT_PACKAGE_NAME: &str = "Grpc.Tools";

/// Default target language for generated code.
pub const DEFAULT_LANGUAGE: &str = "csharp";

/// Output directory used when an entry leaves `output_path` empty.
pub const DEFAULT_OUTPUT_DIR: &str = "Assets/Scripts/Generated";

/// Errors that can occur when loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    /// Failed to parse the TOML configuration file
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize configuration to TOML format
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    /// Configuration file was not found at the specified path
    #[error("Config file not found at: {}", .0.display())]
    NotFound(PathBuf),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Toolchain discovery settings
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Code generation settings
    #[serde(default)]
    pub codegen: CodegenConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Sync entries, processed in file order
    #[serde(default)]
    pub entries: Vec<Entry>,
}

/// Where and how to find the code-generator toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Package directory prefix; directories are named `<package_name>.<version>`
    #[serde(default = "default_package_name")]
    pub package_name: String,
    /// Pinned version; when unset the highest installed version is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Directories scanned for packages, in priority order (relative to the project root)
    #[serde(default = "default_package_roots")]
    pub package_roots: Vec<PathBuf>,
}

/// Code generation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Target language passed as `--<language>_out`
    #[serde(default = "default_language")]
    pub language: String,
    /// Where to write generated code for entries without an `output_path`
    #[serde(default = "default_output_dir")]
    pub default_output_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
    /// Log file path (optional, relative to the project root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_package_name() -> String { DEFAULT_PACKAGE_NAME.to_string() }

fn default_package_roots() -> Vec<PathBuf> {
    vec![PathBuf::from("Packages"), PathBuf::from("../Packages")]
}

fn default_language() -> String { DEFAULT_LANGUAGE.to_string() }

fn default_output_dir() -> PathBuf { PathBuf::from(DEFAULT_OUTPUT_DIR) }

fn default_level() -> String { "info".to_string() }

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            package_name: default_package_name(),
            version: None,
            package_roots: default_package_roots(),
        }
    }
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self { language: default_language(), default_output_dir: default_output_dir() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self { Self { level: default_level(), file: None } }
}

/// Outcome of [`Config::create_default`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new default configuration was written here.
    Created(PathBuf),
    /// A configuration already existed here and was left untouched.
    AlreadyExists(PathBuf),
}

impl Config {
    /// Load configuration from a TOML file at `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save this configuration as a pretty-printed TOML file at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Returns the known configuration location for a project:
    /// `{project_root}/protosync.toml`
    pub fn default_path(project_root: &Path) -> PathBuf { project_root.join(CONFIG_FILE_NAME) }

    /// Load the configuration stored at the project's known location.
    ///
    /// Returns [`ConfigError::NotFound`] when no file exists there.
    pub fn locate(project_root: &Path) -> Result<Self, ConfigError> {
        Self::load_required(&Self::default_path(project_root))
    }

    /// Load configuration from `path`, mapping a missing file to [`ConfigError::NotFound`].
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::from_file(path)
    }

    /// Write the default configuration to the project's known location unless one exists.
    pub fn create_default(project_root: &Path) -> Result<CreateOutcome, ConfigError> {
        let path = Self::default_path(project_root);
        if path.exists() {
            return Ok(CreateOutcome::AlreadyExists(path));
        }
        std::fs::create_dir_all(project_root)?;
        Self::default().save(&path)?;
        Ok(CreateOutcome::Created(path))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            toolchain: ToolchainConfig::default(),
            codegen: CodegenConfig::default(),
            logging: LoggingConfig::default(),
            entries: vec![Entry::new(
                "server",
                "../Server/Protos",
                "Assets/Protos",
                DEFAULT_OUTPUT_DIR,
            )],
        }
    }
}
