//! Package detection and fully-qualified module names, computed purely by
//! walking the file system upward from a module's path.

use common::{package_marker_file, SOURCE_EXTENSION};
use std::path::Path;

/// Returns `true` iff `path` is a directory holding a package marker file.
pub fn is_package(path: &Path) -> bool {
    path.is_dir() && path.join(package_marker_file()).is_file()
}

/// Computes the dotted name segments of the module at `path`, outer to inner.
///
/// Starts from the base name (extension stripped) and prepends parent
/// directory names for as long as each parent is a package.
///
/// ```text
/// foo/__init__.py       -> ["foo", "__init__"]
/// foo/sub/sub_a.py      -> ["foo", "sub", "sub_a"]
/// bar.py (no package)   -> ["bar"]
/// ```
pub fn fully_qualified_name(path: &Path) -> Vec<String> {
    let mut segments = vec![base_name(path)];

    let mut parent = path.parent();
    while let Some(dir) = parent {
        if dir.as_os_str().is_empty() || !is_package(dir) {
            break;
        }
        match dir.file_name() {
            Some(name) => segments.push(name.to_string_lossy().into_owned()),
            None => break,
        }
        parent = dir.parent();
    }

    segments.reverse();
    segments
}

fn base_name(path: &Path) -> String {
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) if ext == SOURCE_EXTENSION => stem.to_string_lossy().into_owned(),
        _ => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
