//! Protosync CLI
//!
//! Mirrors `.proto` trees from server projects into a client project and runs
//! the bundled `protoc` over them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, CreateOutcome};
use logging::LogSettings;
use path::{to_absolute, to_project_relative};
use pipeline::{CodeGenInvoker, PipelineSettings};
use protosync_cli::{
    entries_word, failure_lines, format_summary, resolve_project_root, CliError, Result,
};
use tracing::debug;

/// Command-line interface configuration for protosync.
#[derive(Parser, Debug)]
#[command(name = "protosync", about = "Sync .proto files and generate gRPC client code", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
    /// Project root; relative paths resolve against it (default: current directory)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,
    /// Configuration file (default: <project-root>/protosync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log filter, e.g. `debug` (overrides the configured level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

/// Available protosync commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Mirror every configured entry, then generate code for each
    Sync {
        /// Toolchain version to use instead of the configured or highest installed one
        #[arg(long)]
        toolchain_version: Option<String>,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a default configuration unless one already exists
    Init,
    /// Copy `.proto` files from one tree to another
    Mirror {
        /// Source directory
        source: PathBuf,
        /// Destination directory
        destination: PathBuf,
    },
    /// Run the code generator over a directory of `.proto` files
    Generate {
        /// Directory containing `.proto` files
        proto_dir: PathBuf,
        /// Output directory (default: the configured default output directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Toolchain version to use
        #[arg(long)]
        toolchain_version: Option<String>,
    },
    /// Resolve and print the toolchain
    Toolchain {
        /// Toolchain version to use
        #[arg(long)]
        toolchain_version: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let project_root = resolve_project_root(cli.project_root.as_deref())?;
    let config_path = match &cli.config {
        Some(path) => to_absolute(path, &project_root)?,
        None => Config::default_path(&project_root),
    };
    // A missing or broken config is only fatal for commands that need it.
    let loaded = Config::load_required(&config_path);
    init_logging(loaded.as_ref().ok(), cli.log_level.as_deref(), &project_root)?;
    debug!(project_root = %project_root.display(), config = %config_path.display(), "starting");

    match cli.cmd {
        Commands::Sync { toolchain_version, json } => {
            cmd_sync(&project_root, &config_path, toolchain_version, json)
        }
        Commands::Init => cmd_init(&project_root, &config_path),
        Commands::Mirror { source, destination } => {
            cmd_mirror(&project_root, &source, &destination)
        }
        Commands::Generate { proto_dir, output, toolchain_version } => {
            cmd_generate(&project_root, &optional(loaded)?, &proto_dir, output, toolchain_version)
        }
        Commands::Toolchain { toolchain_version } => {
            cmd_toolchain(&project_root, &optional(loaded)?, toolchain_version)
        }
    }
}

/// Defaults when no configuration exists; a broken one is still an error.
fn optional(loaded: std::result::Result<Config, ConfigError>) -> Result<Config> {
    match loaded {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

fn init_logging(config: Option<&Config>, level: Option<&str>, project_root: &Path) -> Result<()> {
    let mut settings = LogSettings::default();
    if let Some(config) = config {
        settings.level = config.logging.level.clone();
        settings.file =
            config.logging.file.as_ref().map(|f| to_absolute(f, project_root)).transpose()?;
    }
    if let Some(level) = level {
        settings.level = level.to_string();
    }
    logging::init(&settings)?;
    Ok(())
}

fn cmd_sync(
    project_root: &Path,
    config_path: &Path,
    toolchain_version: Option<String>,
    json: bool,
) -> Result<()> {
    let summary = pipeline::sync_all(project_root, Some(config_path), toolchain_version)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_summary(&summary));
    }
    for line in failure_lines(&summary) {
        eprintln!("{}", line);
    }
    if summary.succeeded() {
        Ok(())
    } else {
        Err(CliError::EntriesFailed {
            failed: summary.failures().count(),
            total: summary.results.len(),
        })
    }
}

fn cmd_init(project_root: &Path, config_path: &Path) -> Result<()> {
    let outcome = if config_path == Config::default_path(project_root) {
        Config::create_default(project_root)?
    } else if config_path.exists() {
        CreateOutcome::AlreadyExists(config_path.to_path_buf())
    } else {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::from)?;
        }
        Config::default().save(config_path)?;
        CreateOutcome::Created(config_path.to_path_buf())
    };
    match outcome {
        CreateOutcome::Created(path) => {
            println!("Created {}", to_project_relative(project_root, &path))
        }
        CreateOutcome::AlreadyExists(path) => println!(
            "Configuration already exists at {}; left unchanged",
            to_project_relative(project_root, &path)
        ),
    }
    Ok(())
}

fn cmd_mirror(project_root: &Path, source: &Path, destination: &Path) -> Result<()> {
    let source = to_absolute(source, project_root)?;
    let destination = to_absolute(destination, project_root)?;
    let copied = pipeline::mirror(&source, &destination)?;
    println!(
        "Copied {} proto file(s) to {}",
        copied,
        to_project_relative(project_root, &destination)
    );
    Ok(())
}

fn cmd_generate(
    project_root: &Path,
    config: &Config,
    proto_dir: &Path,
    output: Option<PathBuf>,
    toolchain_version: Option<String>,
) -> Result<()> {
    let settings = PipelineSettings::from_config(config).with_toolchain_version(toolchain_version);
    let toolchain = settings.resolve_toolchain(project_root)?;
    let proto_dir = to_absolute(proto_dir, project_root)?;
    let output = to_absolute(output.unwrap_or(settings.default_output_dir), project_root)?;

    let result = CodeGenInvoker::new(project_root)
        .with_language(settings.resolver.language())
        .generate(&proto_dir, &output, &toolchain)?;
    match result.failure {
        None => {
            println!("Generated code into {}", to_project_relative(project_root, &output));
            Ok(())
        }
        Some(failure) => Err(CliError::Generation(failure)),
    }
}

fn cmd_toolchain(
    project_root: &Path,
    config: &Config,
    toolchain_version: Option<String>,
) -> Result<()> {
    let settings = PipelineSettings::from_config(config).with_toolchain_version(toolchain_version);
    let toolchain = settings.resolve_toolchain(project_root)?;
    println!("version:  {}", toolchain.version);
    println!("package:  {}", toolchain.package_dir.display());
    println!("compiler: {}", toolchain.compiler_binary_path.display());
    println!("plugin:   {}", toolchain.plugin_binary_path.display());
    for include in &toolchain.include_directories {
        let marker = if include.is_dir() { "" } else { " (missing)" };
        println!("include:  {}{}", include.display(), marker);
    }
    println!("{} configured {}", config.entries.len(), entries_word(config.entries.len()));
    Ok(())
}
