//! Path canonicalization for tracked files.

use std::path::{Path, PathBuf};

use crate::AnatomistError;
use common::paths::path_key;

/// Canonicalizes `path` with `dunce`, so Windows paths carry no `\\?\` prefix.
///
/// # Errors
/// `AnatomistError::Io` naming `path` if it does not exist or cannot be read.
pub fn canonical_path(path: &Path) -> Result<PathBuf, AnatomistError> {
    dunce::canonicalize(path).map_err(|e| AnatomistError::io(path, e))
}

/// Canonicalizes `path` and renders it as a forward-slash graph key.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use anatomist::path_util::normalize_path;
///
/// let key = normalize_path(Path::new("./pkg/mod.py")).unwrap();
/// // On Windows: "C:/Users/name/project/pkg/mod.py"
/// // On Unix: "/home/name/project/pkg/mod.py"
/// ```
pub fn normalize_path(path: &Path) -> Result<String, AnatomistError> {
    canonical_path(path).map(|p| path_key(&p))
}
