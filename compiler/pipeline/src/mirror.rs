//! Mirroring `.proto` trees from a source directory into a destination directory.
//!
//! Every run is a full resync: each matching file is copied over whatever is at
//! the same relative path in the destination. Files that exist only in the
//! destination are left alone, so stale files can accumulate there.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use path::{to_relative_normalized, PathError};
use thiserror::Error;
use tracing::debug;
use types::EntryFailure;
use walkdir::WalkDir;

/// File extension matched by the mirror and the generator.
pub const PROTO_EXTENSION: &str = "proto";

/// Errors raised while mirroring a tree.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The source directory does not exist.
    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// Walking the source tree failed.
    #[error("Failed to walk {}: {source}", root.display())]
    Walk {
        /// Tree being walked.
        root: PathBuf,
        /// Underlying walk error.
        source: walkdir::Error,
    },
    /// Creating a directory or copying a file failed.
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        /// File being copied.
        from: PathBuf,
        /// Copy destination.
        to: PathBuf,
        /// Underlying io error.
        source: io::Error,
    },
    /// Failed to create the destination directory.
    #[error("Failed to create {}: {source}", path.display())]
    CreateDir {
        /// Directory being created.
        path: PathBuf,
        /// Underlying io error.
        source: io::Error,
    },
    /// Resolving a directory to its canonical form failed.
    #[error("Failed to resolve {}: {source}", path.display())]
    Resolve {
        /// Directory being resolved.
        path: PathBuf,
        /// Underlying io error.
        source: io::Error,
    },
    /// Source and destination are the same file or directory.
    #[error("Refusing to copy {} onto itself", path.display())]
    SameFile {
        /// Path that would have been overwritten by itself.
        path: PathBuf,
    },
    /// A discovered file was not under the source root.
    #[error(transparent)]
    Path(#[from] PathError),
}

impl From<MirrorError> for EntryFailure {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::SourceNotFound(path) => EntryFailure::SourceNotFound(path),
            other => EntryFailure::Io(other.to_string()),
        }
    }
}

/// Recursively list `*.proto` files under `root`, sorted by file name at each level.
pub fn find_proto_files(root: &Path) -> Result<Vec<PathBuf>, MirrorError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry =
            entry.map_err(|source| MirrorError::Walk { root: root.to_path_buf(), source })?;
        let path = entry.path();
        if path.is_file() && is_proto_file(path) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn is_proto_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(PROTO_EXTENSION))
}

/// Copy every `*.proto` file under `source_dir` to the same relative path under `dest_dir`.
///
/// `dest_dir` and any intermediate directories are created as needed. Existing
/// files are overwritten unconditionally. Returns the number of files copied.
///
/// A destination equal to the source is rejected with [`MirrorError::SameFile`].
/// A destination nested inside the source is excluded from the scan, so repeated
/// runs do not copy it into itself.
pub fn mirror(source_dir: &Path, dest_dir: &Path) -> Result<usize, MirrorError> {
    if !source_dir.is_dir() {
        return Err(MirrorError::SourceNotFound(source_dir.to_path_buf()));
    }
    fs::create_dir_all(dest_dir)
        .map_err(|source| MirrorError::CreateDir { path: dest_dir.to_path_buf(), source })?;

    let nested = nested_destination(source_dir, dest_dir)?;
    let files = find_proto_files(source_dir)?;

    let mut copied = 0;
    for file in files {
        if nested.as_ref().map_or(false, |dest| file.starts_with(dest)) {
            continue;
        }
        let relative = to_relative_normalized(source_dir, &file)?;
        // Built from OS components so non-UTF-8 names are copied verbatim.
        let suffix = file.strip_prefix(source_dir).map_err(|_| PathError::NotInside {
            base: source_dir.to_path_buf(),
            target: file.clone(),
        })?;
        let target = dest_dir.join(suffix);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| MirrorError::CreateDir { path: parent.to_path_buf(), source })?;
        }
        if same_file::is_same_file(&file, &target).unwrap_or(false) {
            return Err(MirrorError::SameFile { path: target });
        }
        fs::copy(&file, &target).map_err(|source| MirrorError::Copy {
            from: file.clone(),
            to: target.clone(),
            source,
        })?;
        debug!(file = %relative, "copied");
        copied += 1;
    }
    Ok(copied)
}

/// `dest_dir` spelled under `source_dir` when it lies inside it, for skipping.
///
/// Errors when both resolve to the same directory.
fn nested_destination(
    source_dir: &Path,
    dest_dir: &Path,
) -> Result<Option<PathBuf>, MirrorError> {
    let canonical = |path: &Path| {
        fs::canonicalize(path)
            .map_err(|source| MirrorError::Resolve { path: path.to_path_buf(), source })
    };
    let source = canonical(source_dir)?;
    let dest = canonical(dest_dir)?;
    if source == dest {
        return Err(MirrorError::SameFile { path: dest_dir.to_path_buf() });
    }
    Ok(dest.strip_prefix(&source).ok().map(|rel| source_dir.join(rel)))
}
