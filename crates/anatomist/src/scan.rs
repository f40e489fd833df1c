//! Source discovery: tracked modules under watch paths, test files under
//! test paths.
//!
//! A watched directory contributes its own `.py` files plus those of every
//! package (a directory with `__init__.py`) found below it, at any depth.
//! Loose files in plain subdirectories are skipped. Test directories are
//! walked fully and filtered by the test file prefix; fixture files found
//! there are tracked but are not tests.

use crate::namespace::is_package;
use crate::path_util::canonical_path;
use crate::AnatomistError;
use common::config::Config;
use common::SOURCE_EXTENSION;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Canonical paths discovered for one analysis run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceFiles {
    /// Every tracked source file, tests included, sorted and unique.
    pub tracked: Vec<PathBuf>,
    /// The test subset of `tracked`, sorted and unique.
    pub tests: Vec<PathBuf>,
}

/// Walks `watch` and `tests` and returns the canonical file lists.
///
/// Explicit file arguments are taken as given, whatever their name.
///
/// # Errors
/// `AnatomistError::Io` if an explicit path does not exist or a directory
/// cannot be read.
pub fn discover(
    watch: &[PathBuf],
    tests: &[PathBuf],
    cfg: &Config,
) -> Result<SourceFiles, AnatomistError> {
    let mut tracked = BTreeSet::new();
    let mut test_files = BTreeSet::new();

    for root in watch {
        let root = canonical_path(root)?;
        if root.is_file() {
            tracked.insert(root);
            continue;
        }
        for entry in WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || !is_excluded(e, cfg))
        {
            let entry = entry.map_err(|e| walk_error(&root, e))?;
            if entry.file_type().is_file()
                && has_source_extension(entry.path())
                && (entry.depth() == 1 || in_package(entry.path()))
            {
                tracked.insert(entry.into_path());
            }
        }
    }

    for root in tests {
        let root = canonical_path(root)?;
        if root.is_file() {
            test_files.insert(root);
            continue;
        }
        for entry in WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_type().is_dir() || !is_excluded(e, cfg))
        {
            let entry = entry.map_err(|e| walk_error(&root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            if cfg.is_test_file_name(name) {
                test_files.insert(entry.into_path());
            } else if cfg.fixture_file.as_deref() == Some(name) {
                // tracked for its implicit edges, never run as a test
                tracked.insert(entry.into_path());
            }
        }
    }

    tracked.extend(test_files.iter().cloned());
    tracing::debug!(
        tracked = tracked.len(),
        tests = test_files.len(),
        "discovered source files"
    );

    Ok(SourceFiles {
        tracked: tracked.into_iter().collect(),
        tests: test_files.into_iter().collect(),
    })
}

fn in_package(path: &Path) -> bool {
    path.parent().is_some_and(is_package)
}

fn is_excluded(entry: &DirEntry, cfg: &Config) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| cfg.is_excluded_dir(name))
}

fn has_source_extension(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

fn walk_error(root: &Path, err: walkdir::Error) -> AnatomistError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("file system loop"));
    AnatomistError::io(path, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for d in [
            "src/pkg/sub",
            "src/pkg/data",
            "src/pkg/__pycache__",
            "src/plain/nested",
            "tests/unit",
            "tests/.venv",
        ] {
            fs::create_dir_all(root.join(d)).unwrap();
        }
        for file in [
            "src/top.py",
            "src/notes.txt",
            "src/pkg/__init__.py",
            "src/pkg/mod.py",
            "src/pkg/sub/__init__.py",
            "src/pkg/sub/deep.py",
            "src/pkg/data/loose.py",
            "src/pkg/__pycache__/__init__.py",
            "src/pkg/__pycache__/cached.py",
            "src/plain/stray.py",
            "src/plain/nested/__init__.py",
            "src/plain/nested/leaf.py",
            "tests/conftest.py",
            "tests/test_top.py",
            "tests/helper.py",
            "tests/unit/test_mod.py",
            "tests/.venv/test_vendored.py",
        ] {
            fs::write(root.join(file), "").unwrap();
        }
        dir
    }

    fn rel(root: &Path, paths: &[PathBuf]) -> Vec<String> {
        let root = canonical_path(root).unwrap();
        paths
            .iter()
            .map(|p| common::paths::path_key(p.strip_prefix(&root).unwrap()))
            .collect()
    }

    #[test]
    fn test_watch_dir_collects_package_files() {
        let dir = project();
        let found = discover(&[dir.path().join("src")], &[], &Config::default()).unwrap();

        assert_eq!(
            rel(dir.path(), &found.tracked),
            [
                "src/pkg/__init__.py",
                "src/pkg/mod.py",
                "src/pkg/sub/__init__.py",
                "src/pkg/sub/deep.py",
                "src/plain/nested/__init__.py",
                "src/plain/nested/leaf.py",
                "src/top.py",
            ]
        );
        assert!(found.tests.is_empty());
    }

    #[test]
    fn test_test_dir_filters_by_prefix_and_skips_excluded() {
        let dir = project();
        let found = discover(&[], &[dir.path().join("tests")], &Config::default()).unwrap();

        assert_eq!(
            rel(dir.path(), &found.tests),
            ["tests/test_top.py", "tests/unit/test_mod.py"]
        );
        // tests are always tracked too, plus the fixture file
        assert_eq!(
            rel(dir.path(), &found.tracked),
            ["tests/conftest.py", "tests/test_top.py", "tests/unit/test_mod.py"]
        );
    }

    #[test]
    fn test_explicit_files_taken_as_given() {
        let dir = project();
        let found = discover(
            &[dir.path().join("src/pkg/data/loose.py")],
            &[dir.path().join("tests/helper.py")],
            &Config::default(),
        )
        .unwrap();

        assert_eq!(
            rel(dir.path(), &found.tracked),
            ["src/pkg/data/loose.py", "tests/helper.py"]
        );
        assert_eq!(rel(dir.path(), &found.tests), ["tests/helper.py"]);
    }

    #[test]
    fn test_overlapping_inputs_deduplicate() {
        let dir = project();
        let src = dir.path().join("src");
        let found = discover(
            &[src.clone(), src.join("pkg/mod.py")],
            &[dir.path().join("tests"), dir.path().join("tests/test_top.py")],
            &Config::default(),
        )
        .unwrap();

        assert_eq!(found.tracked.len(), 10);
        assert_eq!(found.tests.len(), 2);
    }

    #[test]
    fn test_fixture_not_tracked_when_disabled() {
        let dir = project();
        let cfg = Config {
            fixture_file: None,
            ..Config::default()
        };
        let found = discover(&[], &[dir.path().join("tests")], &cfg).unwrap();
        assert_eq!(found.tracked, found.tests);
    }

    #[test]
    fn test_package_below_plain_dir_is_found() {
        let dir = project();
        let found = discover(&[dir.path().join("src/plain")], &[], &Config::default()).unwrap();
        assert_eq!(
            rel(dir.path(), &found.tracked),
            [
                "src/plain/nested/__init__.py",
                "src/plain/nested/leaf.py",
                "src/plain/stray.py",
            ]
        );
    }

    #[test]
    fn test_custom_prefix() {
        let dir = project();
        let cfg = Config {
            test_prefix: "conf".into(),
            ..Config::default()
        };
        let found = discover(&[], &[dir.path().join("tests")], &cfg).unwrap();
        assert_eq!(rel(dir.path(), &found.tests), ["tests/conftest.py"]);
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let dir = project();
        let err = discover(&[dir.path().join("nope")], &[], &Config::default()).unwrap_err();
        assert!(matches!(err, AnatomistError::Io { .. }));
    }
}
