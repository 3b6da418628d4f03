//! Repository discovery
//!
//! Scans an analysis-set root for Git repositories: the root itself and
//! each immediate child directory. Nothing deeper is checked, so nested
//! checkouts (vendored submodules and the like) are never treated as
//! independent repositories.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::AtlasError;

/// Discover Git repositories at the root and one level below it.
///
/// Returns the sorted list of repository paths. An empty list is not an
/// error; callers decide whether that is fatal.
///
/// # Errors
///
/// Returns [`AtlasError::PathNotFound`] if `root` does not exist.
pub fn discover_repos(root: &Path) -> Result<Vec<PathBuf>, AtlasError> {
    if !root.exists() {
        return Err(AtlasError::PathNotFound(root.to_path_buf()));
    }

    let mut repos = Vec::new();

    if root.join(".git").is_dir() {
        repos.push(root.to_path_buf());
    }

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.join(".git").is_dir() {
            repos.push(path);
        }
    }

    repos.sort();
    debug!("Discovered {} repositories under {:?}", repos.len(), root);
    Ok(repos)
}

/// Short name of a repository: the final path segment.
pub fn repo_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
