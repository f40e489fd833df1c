//! Path normalization for node keys and diagnostics.

use std::path::Path;

/// Converts a path into the string key used by the dependency map and graph.
///
/// Strips the Windows UNC prefix and replaces backslashes with forward
/// slashes. Does not touch the file system.
pub fn path_key(path: &Path) -> String {
    dunce::simplified(path).to_string_lossy().replace('\\', "/")
}

/// Renders `path` relative to `base` when it lives under it.
///
/// Paths outside `base` (or with no base at all) are returned unchanged.
pub fn display_relative(path: &str, base: Option<&Path>) -> String {
    let Some(base) = base else {
        return path.to_string();
    };
    match Path::new(path).strip_prefix(base) {
        Ok(rel) if !rel.as_os_str().is_empty() => path_key(rel),
        _ => path.to_string(),
    }
}
