//! Shared vocabulary for the `incremental` workspace.
//!
//! Holds the naming constants of the tracked language, the serializable
//! dependency map handed to downstream schedulers, path normalization and
//! the run configuration.

pub mod config;
pub mod paths;

use std::collections::BTreeMap;

pub use config::{Config, ConfigError};

/// Base name of the file whose presence turns a directory into a package.
pub const PACKAGE_MARKER: &str = "__init__";

/// Extension (without the dot) of tracked source files.
pub const SOURCE_EXTENSION: &str = "py";

/// Tracked file path → sorted list of its direct dependency paths.
///
/// This is the hand-off artifact for the scheduling layer: it is written as
/// JSON and contains only edges between tracked files.
pub type DepMap = BTreeMap<String, Vec<String>>;

/// Returns the file name of the package marker (`__init__.py`).
pub fn package_marker_file() -> String {
    format!("{}.{}", PACKAGE_MARKER, SOURCE_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_marker_file() {
        assert_eq!(package_marker_file(), "__init__.py");
    }

    #[test]
    fn test_dep_map_serializes_sorted() {
        let mut map = DepMap::new();
        map.insert("b.py".into(), vec![]);
        map.insert("a.py".into(), vec!["b.py".into()]);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"a.py":["b.py"],"b.py":[]}"#);
    }
}
