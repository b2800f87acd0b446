//! Pipeline orchestration for the main entry points.
//!
//! A run resolves the toolchain once, mirrors every entry, and only then
//! generates code for every entry. Per-entry failures are recorded in that
//! entry's [`GenerationResult`] and do not stop the batch; global failures
//! (no entries, no toolchain, no configuration) abort before anything is written.

use std::path::{Path, PathBuf};

use config::Config;
use path::{to_absolute, PathError};
use serde::Serialize;
use tracing::{info, warn};
use types::{Entry, EntryFailure, GenerationResult, ToolchainInfo};

use crate::invoker::CodeGenInvoker;
use crate::mirror::mirror;
use crate::toolchain::{version_override_from_env, ToolchainResolver};
use crate::PipelineError;

/// Everything a run needs besides the entries themselves.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Toolchain resolver (package name, language, platform).
    pub resolver: ToolchainResolver,
    /// Pinned toolchain version; `None` selects the highest installed one.
    pub toolchain_version: Option<String>,
    /// Package roots to scan, absolute or relative to the project root.
    pub package_roots: Vec<PathBuf>,
    /// Output directory for entries with an empty `output_path`.
    pub default_output_dir: PathBuf,
}

impl PipelineSettings {
    /// Settings from a loaded configuration.
    ///
    /// A non-empty `GRPC_TOOLS_VERSION` environment variable overrides the
    /// configured version.
    pub fn from_config(config: &Config) -> Self {
        Self::from_config_internal(config, version_override_from_env())
    }

    fn from_config_internal(config: &Config, env_version: Option<String>) -> Self {
        Self {
            resolver: ToolchainResolver::new(&config.toolchain.package_name)
                .with_language(&config.codegen.language),
            toolchain_version: env_version.or_else(|| config.toolchain.version.clone()),
            package_roots: config.toolchain.package_roots.clone(),
            default_output_dir: config.codegen.default_output_dir.clone(),
        }
    }

    /// Pin the toolchain version, taking precedence over config and environment.
    pub fn with_toolchain_version(mut self, version: Option<String>) -> Self {
        if let Some(version) = version.filter(|v| !v.trim().is_empty()) {
            self.toolchain_version = Some(version);
        }
        self
    }

    /// Output directory for `entry`: its own `output_path`, or the default.
    pub fn output_dir_for(&self, entry: &Entry) -> PathBuf {
        if entry.output_path.trim().is_empty() {
            self.default_output_dir.clone()
        } else {
            PathBuf::from(&entry.output_path)
        }
    }

    /// Resolve the toolchain against `project_root`.
    pub fn resolve_toolchain(&self, project_root: &Path) -> Result<ToolchainInfo, PipelineError> {
        let roots = self
            .package_roots
            .iter()
            .map(|root| to_absolute(root, project_root))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.resolver.resolve(self.toolchain_version.as_deref(), &roots)?)
    }
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// The toolchain used for every entry.
    pub toolchain: ToolchainInfo,
    /// Total `.proto` files mirrored across all entries.
    pub total_files_copied: usize,
    /// One result per entry, in configuration order.
    pub results: Vec<GenerationResult>,
}

impl RunSummary {
    /// `true` when every entry succeeded.
    pub fn succeeded(&self) -> bool { self.results.iter().all(|r| r.succeeded) }

    /// Number of entries whose generation succeeded.
    pub fn generated_count(&self) -> usize { self.results.iter().filter(|r| r.succeeded).count() }

    /// Results that failed, in configuration order.
    pub fn failures(&self) -> impl Iterator<Item = &GenerationResult> {
        self.results.iter().filter(|r| !r.succeeded)
    }

    /// The first recorded per-entry failure.
    pub fn first_failure(&self) -> Option<&EntryFailure> {
        self.results.iter().find_map(|r| r.failure.as_ref())
    }
}

/// Run mirror then generation over `entries`.
///
/// `project_root` must be absolute; relative entry paths resolve against it and
/// the generator runs with it as working directory.
pub fn run(
    entries: &[Entry],
    project_root: &Path,
    settings: &PipelineSettings,
) -> Result<RunSummary, PipelineError> {
    if entries.is_empty() {
        return Err(PipelineError::NoEntriesConfigured);
    }
    if !project_root.is_absolute() {
        return Err(PathError::RelativeProjectRoot(project_root.to_path_buf()).into());
    }
    let toolchain = settings.resolve_toolchain(project_root)?;
    info!(
        version = %toolchain.version,
        compiler = %toolchain.compiler_binary_path.display(),
        "toolchain resolved"
    );

    // Every entry is mirrored before any generation starts.
    let mut mirrored: Vec<(usize, Option<EntryFailure>)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let outcome = mirror_entry(entry, project_root);
        match &outcome {
            Ok(count) => info!(entry = entry.label(), files = count, "mirrored"),
            Err(failure) => warn!(entry = entry.label(), %failure, "mirror failed"),
        }
        mirrored.push(match outcome {
            Ok(count) => (count, None),
            Err(failure) => (0, Some(failure)),
        });
    }
    let total_files_copied = mirrored.iter().map(|(count, _)| count).sum();
    info!(total = total_files_copied, "sync complete");

    let invoker =
        CodeGenInvoker::new(project_root).with_language(settings.resolver.language());
    let mut results = Vec::with_capacity(entries.len());
    for (entry, (files_copied, mirror_failure)) in entries.iter().zip(mirrored) {
        let mut result = match mirror_failure {
            Some(failure @ EntryFailure::InvalidEntry(_)) => GenerationResult::failed(failure),
            prior => {
                let generated = generate_entry(entry, project_root, settings, &invoker, &toolchain);
                match prior {
                    Some(failure) => generated.with_prior_failure(failure),
                    None => generated,
                }
            }
        };
        result = result.with_entry_name(entry.label());
        result.files_copied = files_copied;
        if let Some(failure) = &result.failure {
            warn!(entry = entry.label(), %failure, "entry failed");
        }
        results.push(result);
    }

    Ok(RunSummary { toolchain, total_files_copied, results })
}

fn mirror_entry(entry: &Entry, project_root: &Path) -> Result<usize, EntryFailure> {
    entry.validate()?;
    let source = resolve(&entry.source_path, project_root)?;
    let destination = resolve(&entry.destination_path, project_root)?;
    Ok(mirror(&source, &destination)?)
}

fn generate_entry(
    entry: &Entry,
    project_root: &Path,
    settings: &PipelineSettings,
    invoker: &CodeGenInvoker,
    toolchain: &ToolchainInfo,
) -> GenerationResult {
    let dirs = resolve(&entry.destination_path, project_root).and_then(|proto_dir| {
        Ok((proto_dir, resolve(settings.output_dir_for(entry), project_root)?))
    });
    let (proto_dir, output_dir) = match dirs {
        Ok(dirs) => dirs,
        Err(failure) => return GenerationResult::failed(failure),
    };
    match invoker.generate(&proto_dir, &output_dir, toolchain) {
        Ok(result) => result,
        Err(err) => GenerationResult::failed(err.into()),
    }
}

fn resolve(path: impl AsRef<Path>, project_root: &Path) -> Result<PathBuf, EntryFailure> {
    to_absolute(path, project_root).map_err(|e| EntryFailure::Io(e.to_string()))
}

/// "Sync all + generate": load the project's configuration and run every entry.
///
/// `config_path` defaults to `<project_root>/protosync.toml`. `toolchain_version`
/// overrides both the environment and the configured pin.
pub fn sync_all(
    project_root: &Path,
    config_path: Option<&Path>,
    toolchain_version: Option<String>,
) -> Result<RunSummary, PipelineError> {
    let config_path =
        config_path.map(Path::to_path_buf).unwrap_or_else(|| Config::default_path(project_root));
    let config = Config::load_required(&config_path)?;
    let settings = PipelineSettings::from_config(&config).with_toolchain_version(toolchain_version);
    run(&config.entries, project_root, &settings)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::install_toolchain;
    use crate::toolchain::ToolchainError;

    fn settings(platform: &str) -> PipelineSettings {
        PipelineSettings {
            resolver: ToolchainResolver::new("Grpc.Tools")
                .with_platform_dir(Some(platform.to_string()))
                .with_home_dir(None),
            toolchain_version: None,
            package_roots: vec![PathBuf::from("Packages")],
            default_output_dir: PathBuf::from("Generated"),
        }
    }

    fn file_count(dir: &Path) -> usize {
        walkdir::WalkDir::new(dir).into_iter().filter(|e| e.as_ref().unwrap().file_type().is_file()).count()
    }

    #[test]
    fn test_empty_entries_is_an_error_and_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let before = file_count(temp.path());
        let err = run(&[], temp.path(), &settings("linux_x64")).unwrap_err();
        assert!(matches!(err, PipelineError::NoEntriesConfigured));
        assert_eq!(file_count(temp.path()), before);
    }

    #[test]
    fn test_missing_toolchain_aborts_before_mirroring() {
        let temp = tempfile::tempdir().unwrap();
        let src = temp.path().join("server");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.proto"), "").unwrap();
        let entries = vec![Entry::new("e", "server", "client", "")];

        let err = run(&entries, temp.path(), &settings("linux_x64")).unwrap_err();
        match err {
            PipelineError::ToolchainNotFound(ToolchainError::NoVersionFound { roots, .. }) => {
                assert_eq!(roots, vec![temp.path().join("Packages")]);
            }
            other => panic!("expected ToolchainNotFound, got {:?}", other),
        }
        assert!(!temp.path().join("client").exists());
    }

    #[test]
    fn test_relative_project_root_is_rejected() {
        let entries = vec![Entry::new("e", "server", "client", "")];
        let err = run(&entries, Path::new("relative/root"), &settings("linux_x64")).unwrap_err();
        assert!(matches!(err, PipelineError::Path(PathError::RelativeProjectRoot(_))));
    }

    #[test]
    fn test_settings_version_precedence() {
        let mut config = Config::default();
        config.toolchain.version = Some("1.0.0".to_string());

        let from_config = PipelineSettings::from_config_internal(&config, None);
        assert_eq!(from_config.toolchain_version.as_deref(), Some("1.0.0"));

        let from_env = PipelineSettings::from_config_internal(&config, Some("2.0.0".into()));
        assert_eq!(from_env.toolchain_version.as_deref(), Some("2.0.0"));

        let from_cli = from_env.with_toolchain_version(Some("3.0.0".into()));
        assert_eq!(from_cli.toolchain_version.as_deref(), Some("3.0.0"));

        let unchanged = from_cli.with_toolchain_version(None);
        assert_eq!(unchanged.toolchain_version.as_deref(), Some("3.0.0"));
        let blank = unchanged.with_toolchain_version(Some("  ".into()));
        assert_eq!(blank.toolchain_version.as_deref(), Some("3.0.0"));
    }

    #[test]
    fn test_output_dir_for_falls_back_to_default() {
        let settings = settings("linux_x64");
        let with_output = Entry::new("a", "src", "dst", "Custom/Out");
        let without_output = Entry::new("b", "src", "dst", " ");
        assert_eq!(settings.output_dir_for(&with_output), PathBuf::from("Custom/Out"));
        assert_eq!(settings.output_dir_for(&without_output), PathBuf::from("Generated"));

        let from_config = PipelineSettings::from_config_internal(&Config::default(), None);
        assert_eq!(
            from_config.output_dir_for(&without_output),
            PathBuf::from(config::DEFAULT_OUTPUT_DIR)
        );
    }

    #[test]
    fn test_sync_all_without_config() {
        let temp = tempfile::tempdir().unwrap();
        match sync_all(temp.path(), None, None).unwrap_err() {
            PipelineError::ConfigurationNotFound(path) => {
                assert_eq!(path, temp.path().join(config::CONFIG_FILE_NAME))
            }
            other => panic!("expected ConfigurationNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_sync_all_with_no_entries() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.entries.clear();
        config.save(Config::default_path(temp.path())).unwrap();
        assert!(matches!(
            sync_all(temp.path(), None, None).unwrap_err(),
            PipelineError::NoEntriesConfigured
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        const PLATFORM: &str = "linux_x64";

        fn project(script: &str) -> tempfile::TempDir {
            let temp = tempfile::tempdir().unwrap();
            install_toolchain(&temp.path().join("Packages"), "Grpc.Tools", "1.0.0", PLATFORM, script);
            for rel in ["server/auth/auth.proto", "server/game/game.proto", "server/game/sub/item.proto"] {
                let path = temp.path().join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, "syntax = \"proto3\";").unwrap();
            }
            temp
        }

        #[test]
        fn test_run_all_entries() {
            let temp = project("exit 0");
            let entries = vec![
                Entry::new("auth", "server/auth", "Assets/Protos/auth", "Out/auth"),
                Entry::new("game", "server/game", "Assets/Protos/game", ""),
            ];

            let summary = run(&entries, temp.path(), &settings(PLATFORM)).unwrap();
            assert!(summary.succeeded());
            assert_eq!(summary.total_files_copied, 3);
            assert_eq!(summary.generated_count(), 2);
            assert_eq!(summary.toolchain.version, "1.0.0");

            let names: Vec<&str> = summary.results.iter().map(|r| r.entry_name.as_str()).collect();
            assert_eq!(names, vec!["auth", "game"]);
            assert_eq!(summary.results[0].files_copied, 1);
            assert_eq!(summary.results[1].files_copied, 2);

            assert!(temp.path().join("Assets/Protos/game/sub/item.proto").is_file());
            assert!(temp.path().join("Out/auth").is_dir());
            assert!(temp.path().join("Generated").is_dir());
        }

        #[test]
        fn test_failures_are_per_entry() {
            let temp = project("exit 0");
            let entries = vec![
                Entry::new("missing", "server/none", "Assets/Protos/none", ""),
                Entry::new("invalid", "", "Assets/Protos/x", ""),
                Entry::new("ok", "server/auth", "Assets/Protos/auth", ""),
            ];

            let summary = run(&entries, temp.path(), &settings(PLATFORM)).unwrap();
            assert!(!summary.succeeded());
            assert_eq!(summary.generated_count(), 1);
            assert_eq!(summary.total_files_copied, 1);

            assert_eq!(
                summary.results[0].failure,
                Some(EntryFailure::SourceNotFound(temp.path().join("server/none")))
            );
            assert!(matches!(summary.results[1].failure, Some(EntryFailure::InvalidEntry(_))));
            assert_eq!(summary.results[1].exit_code, None);
            assert!(summary.results[2].succeeded);
            assert_eq!(summary.failures().count(), 2);
            assert!(matches!(summary.first_failure(), Some(EntryFailure::SourceNotFound(_))));
        }

        #[test]
        fn test_entry_mirroring_onto_itself_keeps_sources() {
            let temp = project("exit 0");
            let entries = vec![
                Entry::new("self", "server/auth", "./server/auth", "Out/self"),
                Entry::new("game", "server/game", "Assets/Protos/game", ""),
            ];

            let summary = run(&entries, temp.path(), &settings(PLATFORM)).unwrap();
            assert!(matches!(summary.results[0].failure, Some(EntryFailure::Io(_))));
            assert!(!summary.results[0].succeeded);
            assert!(summary.results[1].succeeded);
            assert_eq!(
                fs::read_to_string(temp.path().join("server/auth/auth.proto")).unwrap(),
                "syntax = \"proto3\";"
            );
        }

        #[test]
        fn test_generator_stderr_fails_entry() {
            let temp = project("echo 'note: something' >&2\nexit 0");
            let entries = vec![Entry::new("auth", "server/auth", "Assets/Protos/auth", "")];

            let summary = run(&entries, temp.path(), &settings(PLATFORM)).unwrap();
            let result = &summary.results[0];
            assert!(!result.succeeded);
            assert_eq!(result.exit_code, Some(0));
            assert_eq!(result.stderr, "note: something\n");
            assert_eq!(result.files_copied, 1);
        }

        #[test]
        fn test_stale_destination_still_generates_when_source_missing() {
            let temp = project("exit 0");
            let dest = temp.path().join("Assets/Protos/old");
            fs::create_dir_all(&dest).unwrap();
            fs::write(dest.join("old.proto"), "").unwrap();
            let entries = vec![Entry::new("old", "server/gone", "Assets/Protos/old", "")];

            let summary = run(&entries, temp.path(), &settings(PLATFORM)).unwrap();
            let result = &summary.results[0];
            assert_eq!(result.exit_code, Some(0));
            assert!(!result.succeeded);
            assert!(matches!(result.failure, Some(EntryFailure::SourceNotFound(_))));
        }

        #[test]
        fn test_sync_all_reads_config() {
            let temp = project("exit 0");
            let host = crate::toolchain::current_platform_dir().unwrap();
            install_toolchain(&temp.path().join("Packages"), "Grpc.Tools", "1.0.0", &host, "exit 0");
            let mut config = Config::default();
            config.toolchain.package_roots = vec![PathBuf::from("Packages")];
            config.entries = vec![Entry::new("auth", "server/auth", "Assets/Protos/auth", "")];
            config.save(Config::default_path(temp.path())).unwrap();

            let summary = sync_all(temp.path(), None, Some("1.0.0".to_string())).unwrap();
            assert!(summary.succeeded());
            assert!(temp.path().join(config::DEFAULT_OUTPUT_DIR).is_dir());
        }
    }
}
