// SPDX-License-Identifier: CC0-1.0

//! Path utility functions for resolving configured paths and finding the project root.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Canonical separator used in every relative path this module returns.
pub const CANONICAL_SEPARATOR: char = '/';

/// Errors produced by path resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// `target` does not lie strictly inside `base`.
    #[error("{} is not inside {}", target.display(), base.display())]
    NotInside {
        /// The base directory.
        base: PathBuf,
        /// The path that was expected to be under it.
        target: PathBuf,
    },
    /// A relative path was resolved against a project root that is itself relative.
    #[error("Project root must be absolute: {}", .0.display())]
    RelativeProjectRoot(PathBuf),
    /// No directory containing the marker file was found walking upwards.
    #[error("Could not find project root ({marker} not found above {})", start.display())]
    ProjectRootNotFound {
        /// Marker file name that was searched for.
        marker: String,
        /// Directory the search started from.
        start: PathBuf,
    },
}

/// Resolve `path` to an absolute, normalized path.
///
/// Absolute paths are returned normalized; relative paths are joined onto
/// `project_root` first. Normalization is lexical (`.` dropped, `..` folded), so
/// the path does not need to exist yet.
pub fn to_absolute(path: impl AsRef<Path>, project_root: impl AsRef<Path>) -> Result<PathBuf, PathError> {
    let path = path.as_ref();
    if path.is_absolute() {
        return Ok(normalize(path));
    }
    let project_root = project_root.as_ref();
    if !project_root.is_absolute() {
        return Err(PathError::RelativeProjectRoot(project_root.to_path_buf()));
    }
    Ok(normalize(&project_root.join(path)))
}

/// Lexically normalize a path: drop `.` components and fold `..` into its parent.
///
/// `..` never climbs above the root of an absolute path.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Compute `target` relative to `base`, with `/` separators.
///
/// `base` must be an ancestor directory of `target`. The result is built from
/// path components rather than a URI, so nothing is escaped and file names with
/// spaces or `%` come back verbatim. Joining the result onto `base` names the
/// same file as `target`.
pub fn to_relative_normalized(
    base: impl AsRef<Path>,
    target: impl AsRef<Path>,
) -> Result<String, PathError> {
    let base = normalize(base.as_ref());
    let target = normalize(target.as_ref());
    let not_inside = || PathError::NotInside { base: base.clone(), target: target.clone() };

    let relative = pathdiff::diff_paths(&target, &base).ok_or_else(not_inside)?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(not_inside()),
        }
    }
    if parts.is_empty() {
        return Err(not_inside());
    }

    Ok(parts.join(&CANONICAL_SEPARATOR.to_string()))
}

/// Express `chosen` relative to `project_root` for storing in configuration.
///
/// Paths inside the project root come back relative (`Assets/Protos`); paths
/// outside it stay absolute. Either way separators are `/`.
pub fn to_project_relative(project_root: impl AsRef<Path>, chosen: impl AsRef<Path>) -> String {
    let root = normalize(project_root.as_ref());
    let full = normalize(chosen.as_ref());
    match full.strip_prefix(&root) {
        Ok(rel) if !rel.as_os_str().is_empty() => to_forward_slashes(rel),
        _ => to_forward_slashes(&full),
    }
}

fn to_forward_slashes(path: &Path) -> String { path.to_string_lossy().replace('\\', "/") }

/// Find the project root by walking up from `start`.
///
/// Returns the first directory (starting with `start` itself) that contains a
/// file named `marker`.
pub fn find_project_root(start: impl AsRef<Path>, marker: &str) -> Result<PathBuf, PathError> {
    let start = start.as_ref();
    let mut current = start.to_path_buf();
    loop {
        if current.join(marker).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(PathError::ProjectRootNotFound {
                marker: marker.to_string(),
                start: start.to_path_buf(),
            });
        }
    }
}
