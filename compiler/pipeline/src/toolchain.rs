//! Code-generator toolchain discovery.
//!
//! A toolchain is an installed package directory named `<PackageName>.<version>`
//! (the NuGet `Grpc.Tools` layout):
//!
//! ```text
//! <root>/Grpc.Tools.2.72.0/
//!     tools/
//!         include/                 well-known types
//!         linux_x64/protoc
//!         linux_x64/grpc_csharp_plugin
//! ```
//!
//! Resolution is two-tier: an explicit version wins outright, otherwise the
//! highest parseable version found across all candidate roots is used.

use std::env::consts::EXE_SUFFIX;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use types::{ToolchainInfo, ToolchainVersion};

/// Environment variable that pins the toolchain version.
pub const VERSION_ENV_VAR: &str = "GRPC_TOOLS_VERSION";

/// Compiler binary name, without the platform executable suffix.
pub const COMPILER_BINARY: &str = "protoc";

/// Errors raised while resolving a toolchain. Every variant names what was tried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolchainError {
    /// No `<package>.<version>` directory with a parseable version in any root.
    #[error("No {package_name}.<version> directory found in: {}", display_paths(.roots))]
    NoVersionFound {
        /// Package name that was scanned for.
        package_name: String,
        /// Candidate roots that were scanned.
        roots: Vec<PathBuf>,
    },
    /// The selected version has no package directory in any root.
    #[error("Toolchain {version} not installed; tried: {}", display_paths(.attempted))]
    PackageDirNotFound {
        /// Selected version.
        version: String,
        /// Package directories that were checked.
        attempted: Vec<PathBuf>,
    },
    /// No binary directory name is known for this host.
    #[error("Unsupported platform {os}/{arch}")]
    UnsupportedPlatform {
        /// Host operating system.
        os: String,
        /// Host architecture.
        arch: String,
    },
    /// The platform binary directory is missing.
    #[error("Toolchain binary directory not found: {}", .0.display())]
    BinaryDirNotFound(PathBuf),
    /// The compiler binary is missing.
    #[error("Compiler binary not found: {}", .0.display())]
    CompilerNotFound(PathBuf),
    /// The RPC plugin binary is missing.
    #[error("Plugin binary not found: {}", .0.display())]
    PluginNotFound(PathBuf),
    /// None of the include directory candidates exist.
    #[error("No protobuf include directory found; tried: {}", display_paths(.attempted))]
    IncludeNotFound {
        /// Include directories that were checked.
        attempted: Vec<PathBuf>,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "(none)".to_string();
    }
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

/// Binary directory name for an OS/architecture pair, e.g. `linux_x64`.
pub fn platform_dir_name(os: &str, arch: &str) -> Option<String> {
    let os = match os {
        "windows" => "windows",
        "linux" => "linux",
        "macos" => "macosx",
        _ => return None,
    };
    let arch = match arch {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        _ => return None,
    };
    Some(format!("{}_{}", os, arch))
}

/// Binary directory name for the host.
pub fn current_platform_dir() -> Option<String> {
    platform_dir_name(std::env::consts::OS, std::env::consts::ARCH)
}

/// Read the version pin from [`VERSION_ENV_VAR`]; empty values count as unset.
pub fn version_override_from_env() -> Option<String> {
    version_override_internal(std::env::var(VERSION_ENV_VAR).ok())
}

fn version_override_internal(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Locates an installed toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainResolver {
    package_name: String,
    language: String,
    platform_dir: Option<String>,
    home_dir: Option<PathBuf>,
}

impl ToolchainResolver {
    /// Resolver for `package_name` on the host platform, generating C# stubs.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            language: "csharp".to_string(),
            platform_dir: current_platform_dir(),
            home_dir: dirs::home_dir(),
        }
    }

    /// Target language; selects the `grpc_<language>_plugin` binary.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Override the platform binary directory name (e.g. `windows_x86`).
    pub fn with_platform_dir(mut self, platform_dir: Option<String>) -> Self {
        self.platform_dir = platform_dir;
        self
    }

    /// Override the home directory holding the `.nuget/packages` cache.
    pub fn with_home_dir(mut self, home_dir: Option<PathBuf>) -> Self {
        self.home_dir = home_dir;
        self
    }

    /// Package name being resolved.
    pub fn package_name(&self) -> &str { &self.package_name }

    /// Target language.
    pub fn language(&self) -> &str { &self.language }

    /// Plugin binary name for the target language, without executable suffix.
    pub fn plugin_binary_name(&self) -> String { format!("grpc_{}_plugin", self.language) }

    /// Pick the highest parseable version across `roots`.
    ///
    /// Roots are scanned in order; on equal versions the first root wins.
    /// Missing or unreadable roots are skipped.
    pub fn select_version(&self, roots: &[PathBuf]) -> Result<String, ToolchainError> {
        let prefix = format!("{}.", self.package_name);
        let mut best: Option<ToolchainVersion> = None;

        for root in roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(root = %root.display(), error = %e, "skipping package root");
                    continue;
                }
            };
            let mut names: Vec<String> = entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_dir())
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect();
            names.sort();

            for name in names {
                let Some(suffix) = name.strip_prefix(&prefix) else { continue };
                match ToolchainVersion::parse(suffix) {
                    Ok(version) => {
                        if best.as_ref().map_or(true, |b| version > *b) {
                            best = Some(version);
                        }
                    }
                    Err(_) => debug!(dir = %name, "ignoring unparseable toolchain version"),
                }
            }
        }

        best.map(|v| v.version_string).ok_or_else(|| ToolchainError::NoVersionFound {
            package_name: self.package_name.clone(),
            roots: roots.to_vec(),
        })
    }

    /// Resolve the toolchain, verifying every required file and directory.
    pub fn resolve(
        &self,
        explicit_version: Option<&str>,
        roots: &[PathBuf],
    ) -> Result<ToolchainInfo, ToolchainError> {
        let version = match explicit_version.map(str::trim).filter(|v| !v.is_empty()) {
            Some(version) => version.to_string(),
            None => self.select_version(roots)?,
        };

        let dir_name = format!("{}.{}", self.package_name, version);
        let attempted: Vec<PathBuf> = roots.iter().map(|root| root.join(&dir_name)).collect();
        let package_dir = attempted
            .iter()
            .find(|dir| dir.is_dir())
            .cloned()
            .ok_or_else(|| ToolchainError::PackageDirNotFound {
                version: version.clone(),
                attempted: attempted.clone(),
            })?;

        let platform_dir = self.platform_dir.as_deref().ok_or_else(|| {
            ToolchainError::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            }
        })?;

        let tools_dir = package_dir.join("tools");
        let bin_dir = tools_dir.join(platform_dir);
        if !bin_dir.is_dir() {
            return Err(ToolchainError::BinaryDirNotFound(bin_dir));
        }

        let compiler_binary_path = bin_dir.join(format!("{}{}", COMPILER_BINARY, EXE_SUFFIX));
        if !compiler_binary_path.is_file() {
            return Err(ToolchainError::CompilerNotFound(compiler_binary_path));
        }

        let plugin_binary_path =
            bin_dir.join(format!("{}{}", self.plugin_binary_name(), EXE_SUFFIX));
        if !plugin_binary_path.is_file() {
            return Err(ToolchainError::PluginNotFound(plugin_binary_path));
        }

        let include_directories = self.include_candidates(&tools_dir, &version);
        if !include_directories.iter().any(|dir| dir.is_dir()) {
            return Err(ToolchainError::IncludeNotFound { attempted: include_directories });
        }
        if let Some(missing) = include_directories.iter().find(|dir| !dir.is_dir()) {
            warn!(path = %missing.display(), "optional include directory not present");
        }

        Ok(ToolchainInfo {
            version,
            package_dir,
            compiler_binary_path,
            plugin_binary_path,
            include_directories,
        })
    }

    /// Bundled `tools/include`, then the user-global NuGet cache include directory.
    fn include_candidates(&self, tools_dir: &Path, version: &str) -> Vec<PathBuf> {
        let mut candidates = vec![tools_dir.join("include")];
        if let Some(home) = &self.home_dir {
            candidates.push(
                home.join(".nuget")
                    .join("packages")
                    .join(self.package_name.to_lowercase())
                    .join(version)
                    .join("build")
                    .join("native")
                    .join("include"),
            );
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::install_toolchain;

    const PLATFORM: &str = "linux_x64";

    fn resolver() -> ToolchainResolver {
        ToolchainResolver::new("Grpc.Tools")
            .with_platform_dir(Some(PLATFORM.to_string()))
            .with_home_dir(None)
    }

    fn mkdirs(root: &Path, names: &[&str]) {
        for name in names {
            fs::create_dir_all(root.join(name)).unwrap();
        }
    }

    #[test]
    fn test_platform_dir_name() {
        assert_eq!(platform_dir_name("windows", "x86_64").as_deref(), Some("windows_x64"));
        assert_eq!(platform_dir_name("windows", "x86").as_deref(), Some("windows_x86"));
        assert_eq!(platform_dir_name("linux", "aarch64").as_deref(), Some("linux_arm64"));
        assert_eq!(platform_dir_name("macos", "x86_64").as_deref(), Some("macosx_x64"));
        assert_eq!(platform_dir_name("freebsd", "x86_64"), None);
        assert_eq!(platform_dir_name("linux", "riscv64"), None);
    }

    #[test]
    fn test_version_override_internal() {
        assert_eq!(version_override_internal(None), None);
        assert_eq!(version_override_internal(Some(String::new())), None);
        assert_eq!(version_override_internal(Some("  ".to_string())), None);
        assert_eq!(version_override_internal(Some(" 2.60.0 ".to_string())), Some("2.60.0".into()));
    }

    #[test]
    fn test_select_version_numeric_not_lexical() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["Grpc.Tools.1.2.0", "Grpc.Tools.1.10.0", "Grpc.Tools.1.9.9"]);
        let version = resolver().select_version(&[temp.path().to_path_buf()]).unwrap();
        assert_eq!(version, "1.10.0");
    }

    #[test]
    fn test_select_version_across_roots() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        mkdirs(&a, &["Grpc.Tools.2.50.0"]);
        mkdirs(&b, &["Grpc.Tools.2.72.0", "Grpc.Tools.2.60.0"]);
        let missing = temp.path().join("missing");
        let version = resolver().select_version(&[missing, a, b]).unwrap();
        assert_eq!(version, "2.72.0");
    }

    #[test]
    fn test_select_version_tie_prefers_first_root() {
        let temp = tempfile::tempdir().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        mkdirs(&a, &["Grpc.Tools.2.1"]);
        mkdirs(&b, &["Grpc.Tools.2.1.0"]);
        assert_eq!(resolver().select_version(&[a.clone(), b.clone()]).unwrap(), "2.1");
        assert_eq!(resolver().select_version(&[b, a]).unwrap(), "2.1.0");
    }

    #[test]
    fn test_select_version_ignores_unparseable_and_files() {
        let temp = tempfile::tempdir().unwrap();
        mkdirs(temp.path(), &["Grpc.Tools.latest", "Grpc.Tools.2.0.0-pre1", "Grpc.Core.9.9.9"]);
        fs::write(temp.path().join("Grpc.Tools.3.0.0"), "not a directory").unwrap();

        let err = resolver().select_version(&[temp.path().to_path_buf()]).unwrap_err();
        assert_eq!(
            err,
            ToolchainError::NoVersionFound {
                package_name: "Grpc.Tools".to_string(),
                roots: vec![temp.path().to_path_buf()],
            }
        );
    }

    #[test]
    fn test_resolve_full_toolchain() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Packages");
        let package_dir = install_toolchain(&root, "Grpc.Tools", "2.72.0", PLATFORM, "exit 0");
        mkdirs(&root, &["Grpc.Tools.2.9.0"]);

        let info = resolver().resolve(None, &[root.clone()]).unwrap();
        let bin_dir = package_dir.join("tools").join(PLATFORM);
        assert_eq!(info.version, "2.72.0");
        assert_eq!(info.package_dir, package_dir);
        assert_eq!(info.compiler_binary_path, bin_dir.join(format!("protoc{}", EXE_SUFFIX)));
        assert_eq!(
            info.plugin_binary_path,
            bin_dir.join(format!("grpc_csharp_plugin{}", EXE_SUFFIX))
        );
        assert_eq!(info.include_directories, vec![package_dir.join("tools").join("include")]);
    }

    #[test]
    fn test_explicit_version_wins() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Packages");
        install_toolchain(&root, "Grpc.Tools", "2.50.0", PLATFORM, "exit 0");
        install_toolchain(&root, "Grpc.Tools", "2.72.0", PLATFORM, "exit 0");

        let info = resolver().resolve(Some("2.50.0"), &[root.clone()]).unwrap();
        assert_eq!(info.version, "2.50.0");

        // An explicit version is used even when it is not installed.
        let err = resolver().resolve(Some("9.9.9"), &[root.clone()]).unwrap_err();
        assert_eq!(
            err,
            ToolchainError::PackageDirNotFound {
                version: "9.9.9".to_string(),
                attempted: vec![root.join("Grpc.Tools.9.9.9")],
            }
        );

        // Blank explicit versions fall back to scanning.
        assert_eq!(resolver().resolve(Some(" "), &[root]).unwrap().version, "2.72.0");
    }

    #[test]
    fn test_resolve_uses_first_root_with_package() {
        let temp = tempfile::tempdir().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        let package_dir = install_toolchain(&second, "Grpc.Tools", "1.0.0", PLATFORM, "exit 0");

        let info = resolver().resolve(Some("1.0.0"), &[first, second]).unwrap();
        assert_eq!(info.package_dir, package_dir);
    }

    #[test]
    fn test_resolve_reports_missing_pieces() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Packages");
        let package_dir = root.join("Grpc.Tools.1.0.0");
        let tools = package_dir.join("tools");
        fs::create_dir_all(&tools).unwrap();
        let roots = vec![root.clone()];

        let bin_dir = tools.join(PLATFORM);
        assert_eq!(
            resolver().resolve(None, &roots).unwrap_err(),
            ToolchainError::BinaryDirNotFound(bin_dir.clone())
        );

        fs::create_dir_all(&bin_dir).unwrap();
        let compiler = bin_dir.join(format!("protoc{}", EXE_SUFFIX));
        assert_eq!(
            resolver().resolve(None, &roots).unwrap_err(),
            ToolchainError::CompilerNotFound(compiler.clone())
        );

        fs::write(&compiler, "").unwrap();
        let plugin = bin_dir.join(format!("grpc_csharp_plugin{}", EXE_SUFFIX));
        assert_eq!(
            resolver().resolve(None, &roots).unwrap_err(),
            ToolchainError::PluginNotFound(plugin.clone())
        );

        fs::write(&plugin, "").unwrap();
        assert_eq!(
            resolver().resolve(None, &roots).unwrap_err(),
            ToolchainError::IncludeNotFound { attempted: vec![tools.join("include")] }
        );

        let no_platform = resolver().with_platform_dir(None).resolve(None, &roots).unwrap_err();
        assert!(matches!(no_platform, ToolchainError::UnsupportedPlatform { .. }));
    }

    #[test]
    fn test_nuget_cache_include() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("Packages");
        let package_dir = install_toolchain(&root, "Grpc.Tools", "2.72.0", PLATFORM, "exit 0");
        fs::remove_dir_all(package_dir.join("tools").join("include")).unwrap();

        let home = temp.path().join("home");
        let nuget_include =
            home.join(".nuget/packages/grpc.tools/2.72.0/build/native/include");
        fs::create_dir_all(&nuget_include).unwrap();

        let info = resolver().with_home_dir(Some(home)).resolve(None, &[root]).unwrap();
        assert_eq!(
            info.include_directories,
            vec![package_dir.join("tools").join("include"), nuget_include]
        );
    }

    #[test]
    fn test_plugin_name_follows_language() {
        let resolver = resolver().with_language("cpp");
        assert_eq!(resolver.plugin_binary_name(), "grpc_cpp_plugin");
        assert_eq!(resolver.language(), "cpp");
        assert_eq!(resolver.package_name(), "Grpc.Tools");
    }
}
