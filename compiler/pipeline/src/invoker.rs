//! Running the external code generator over one proto tree.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, error, info};
use types::{EntryFailure, GenerationResult, ToolchainInfo};

use crate::mirror::{find_proto_files, MirrorError};

/// Errors that prevent the generator from running at all.
///
/// A generator that runs and fails is not an error here; it is reported through
/// [`GenerationResult::succeeded`].
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The proto directory does not exist.
    #[error("Proto directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// The proto directory contains no `*.proto` files.
    #[error("No .proto files found in {}", .0.display())]
    NoProtoFiles(PathBuf),
    /// Listing the proto directory failed.
    #[error(transparent)]
    Scan(#[from] MirrorError),
    /// The output directory could not be created.
    #[error("Failed to create output directory {}: {source}", path.display())]
    OutputDir {
        /// Directory being created.
        path: PathBuf,
        /// Underlying io error.
        source: io::Error,
    },
    /// The compiler process could not be started.
    #[error("Failed to start {}: {source}", program.display())]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying io error.
        source: io::Error,
    },
}

impl From<InvokeError> for EntryFailure {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::SourceNotFound(path) => EntryFailure::SourceNotFound(path),
            InvokeError::NoProtoFiles(path) => EntryFailure::NoProtoFiles(path),
            other => EntryFailure::Io(other.to_string()),
        }
    }
}

/// Builds and runs `protoc` invocations.
#[derive(Debug, Clone)]
pub struct CodeGenInvoker {
    language: String,
    working_dir: PathBuf,
}

impl CodeGenInvoker {
    /// Invoker that runs the compiler from `working_dir` (the project root).
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self { language: "csharp".to_string(), working_dir: working_dir.into() }
    }

    /// Target language for the `--<language>_out` flag.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Compiler arguments, in order: include directories that exist, the proto
    /// directory itself, the language and RPC output flags, the plugin path, then
    /// every proto file.
    pub fn build_arguments(
        &self,
        proto_dir: &Path,
        output_dir: &Path,
        toolchain: &ToolchainInfo,
        proto_files: &[PathBuf],
    ) -> Vec<OsString> {
        let mut args = Vec::with_capacity(toolchain.include_directories.len() + proto_files.len() + 4);

        for include in toolchain.include_directories.iter().filter(|dir| dir.is_dir()) {
            args.push(flag("--proto_path=", include));
        }
        args.push(flag("--proto_path=", proto_dir));
        args.push(flag(&format!("--{}_out=", self.language), output_dir));
        args.push(flag("--grpc_out=", output_dir));
        args.push(flag("--plugin=protoc-gen-grpc=", &toolchain.plugin_binary_path));
        args.extend(proto_files.iter().map(|file| file.as_os_str().to_os_string()));
        args
    }

    /// Generate code for every `*.proto` file under `proto_dir` into `output_dir`.
    ///
    /// Blocks until the compiler exits. The result is successful only if the exit
    /// code is 0 *and* nothing was written to standard error.
    pub fn generate(
        &self,
        proto_dir: &Path,
        output_dir: &Path,
        toolchain: &ToolchainInfo,
    ) -> Result<GenerationResult, InvokeError> {
        if !proto_dir.is_dir() {
            return Err(InvokeError::SourceNotFound(proto_dir.to_path_buf()));
        }
        let proto_files = find_proto_files(proto_dir)?;
        if proto_files.is_empty() {
            return Err(InvokeError::NoProtoFiles(proto_dir.to_path_buf()));
        }
        fs::create_dir_all(output_dir)
            .map_err(|source| InvokeError::OutputDir { path: output_dir.to_path_buf(), source })?;

        let args = self.build_arguments(proto_dir, output_dir, toolchain, &proto_files);
        debug!(
            compiler = %toolchain.compiler_binary_path.display(),
            args = ?args,
            "running code generator"
        );

        let output = Command::new(&toolchain.compiler_binary_path)
            .args(&args)
            .current_dir(&self.working_dir)
            .output()
            .map_err(|source| InvokeError::Spawn {
                program: toolchain.compiler_binary_path.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stdout.is_empty() {
            info!("{}", stdout.trim_end());
        }

        let result = GenerationResult::from_process(output.status.code(), stdout, stderr);
        if result.succeeded {
            info!(files = proto_files.len(), output = %output_dir.display(), "generation complete");
        } else {
            error!(exit_code = ?result.exit_code, stderr = %result.stderr.trim_end(), "generation failed");
        }
        Ok(result)
    }
}

fn flag(prefix: &str, path: &Path) -> OsString {
    let mut arg = OsString::from(prefix);
    arg.push(path.as_os_str());
    arg
}
