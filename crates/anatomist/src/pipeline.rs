//! One analysis run: tracked files in, dependency map and graph out.
//!
//! 1. **Universe**: build the [`ModuleSet`] from tracked and test files.
//! 2. **Resolve**: extract and resolve the imports of every module.
//! 3. **Graph**: build the [`DepGraph`] from the direct-dependency map, then
//!    attach implicit fixture-file dependencies.
//!
//! The first syntax error aborts the run.

use crate::module_set::ModuleSet;
use crate::AnatomistError;
use common::config::Config;
use common::paths::path_key;
use common::DepMap;
use oracle::DepGraph;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Result of [`analyze`].
#[derive(Debug)]
pub struct Analysis {
    pub modules: ModuleSet,
    /// Graph keys of the test files.
    pub tests: BTreeSet<String>,
    /// Tracked path -> sorted direct dependency paths.
    pub deps: DepMap,
    pub graph: DepGraph,
}

/// Runs extraction and resolution over `tracked` ∪ `tests`.
///
/// # Errors
/// - `Parse` for the first tracked file that is not valid source.
/// - `DuplicateName` if two files share a fully-qualified name.
/// - `Io` if a tracked file cannot be read.
pub fn analyze(
    tracked: &[PathBuf],
    tests: &[PathBuf],
    cfg: &Config,
) -> Result<Analysis, AnatomistError> {
    let modules = ModuleSet::new(tracked.iter().chain(tests).cloned())?;

    let mut deps = DepMap::new();
    for module in modules.iter() {
        let imports = modules.imports_of(module)?;
        tracing::debug!(
            module = %module.dotted_name(),
            deps = imports.len(),
            "resolved imports"
        );
        let targets: BTreeSet<String> = imports.iter().map(|p| path_key(p)).collect();
        deps.insert(path_key(module.path()), targets.into_iter().collect());
    }

    let mut graph = DepGraph::from_deps(&deps);
    if let Some(fixture) = cfg.fixture_file.as_deref() {
        add_fixture_deps(&mut graph, &modules, fixture);
    }

    let tests = tests.iter().map(|p| path_key(p)).collect();
    tracing::info!(modules = modules.len(), "analysis complete");

    Ok(Analysis {
        modules,
        tests,
        deps,
        graph,
    })
}

/// Every module under the directory of a tracked fixture file implicitly
/// depends on that fixture.
fn add_fixture_deps(graph: &mut DepGraph, modules: &ModuleSet, fixture_name: &str) {
    let fixtures: Vec<&Path> = modules
        .iter()
        .map(|m| m.path())
        .filter(|p| p.file_name().is_some_and(|n| n == fixture_name))
        .collect();

    for fixture in fixtures {
        let Some(dir) = fixture.parent() else {
            continue;
        };
        let fixture_key = path_key(fixture);
        for module in modules.iter() {
            if module.path() != fixture && module.path().starts_with(dir) {
                tracing::trace!(module = %module.path().display(), fixture = %fixture_key, "implicit dependency");
                graph.add_implicit_dep(&path_key(module.path()), &fixture_key);
            }
        }
    }
}

impl Analysis {
    /// One `"<path>: <closure>"` line per tracked module, sorted by path.
    pub fn describe_all(&self, base: Option<&Path>) -> Vec<String> {
        self.deps
            .keys()
            .filter_map(|name| self.graph.describe(name, base))
            .collect()
    }

    /// The files a test depends on, itself included.
    pub fn test_closure(&self, test: &Path) -> Option<BTreeSet<&str>> {
        let key = path_key(test);
        if !self.tests.contains(&key) {
            return None;
        }
        self.graph.all_deps(&key)
    }

    /// Tracked files, dependencies first.
    pub fn order(&self) -> Vec<&str> {
        self.graph.topological_order()
    }

    pub fn write_dot<W: io::Write>(&self, out: W) -> io::Result<()> {
        self.graph.write_dot(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Project {
        _dir: tempfile::TempDir,
        root: PathBuf,
    }

    impl Project {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dunce::canonicalize(dir.path()).unwrap();
            for (rel, body) in files {
                let path = root.join(rel);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, body).unwrap();
            }
            Project { _dir: dir, root }
        }

        fn p(&self, rel: &str) -> PathBuf {
            self.root.join(rel)
        }

        fn key(&self, rel: &str) -> String {
            path_key(&self.p(rel))
        }

        fn paths(&self, rels: &[&str]) -> Vec<PathBuf> {
            rels.iter().map(|r| self.p(r)).collect()
        }
    }

    fn sample() -> Project {
        Project::new(&[
            ("pkg/__init__.py", "from .helpers import obj\n"),
            ("pkg/helpers.py", "import json\nobj = 1\n"),
            ("pkg/core.py", "from pkg import obj\nfrom pkg.helpers import obj\n"),
            ("pkg/cycle_a.py", "from . import cycle_b\n"),
            ("pkg/cycle_b.py", "from . import cycle_a\n"),
            ("tests/conftest.py", "import pkg\n"),
            ("tests/test_core.py", "from pkg import core\n"),
            ("tests/test_cycle.py", "from pkg.cycle_a import x\n"),
        ])
    }

    fn run(p: &Project, cfg: &Config) -> Analysis {
        analyze(
            &p.paths(&[
                "pkg/__init__.py",
                "pkg/helpers.py",
                "pkg/core.py",
                "pkg/cycle_a.py",
                "pkg/cycle_b.py",
                "tests/conftest.py",
            ]),
            &p.paths(&["tests/test_core.py", "tests/test_cycle.py"]),
            cfg,
        )
        .unwrap()
    }

    #[test]
    fn test_direct_deps() {
        let p = sample();
        let a = run(&p, &Config::default());

        assert_eq!(a.deps.len(), 8);
        assert_eq!(a.deps[&p.key("pkg/helpers.py")], Vec::<String>::new());
        assert_eq!(a.deps[&p.key("pkg/__init__.py")], [p.key("pkg/helpers.py")]);
        let mut core = vec![p.key("pkg/__init__.py"), p.key("pkg/helpers.py")];
        core.sort();
        assert_eq!(a.deps[&p.key("pkg/core.py")], core);
        assert_eq!(a.deps[&p.key("tests/test_core.py")], [p.key("pkg/core.py")]);
    }

    #[test]
    fn test_no_imports_closure_is_self() {
        let p = sample();
        let a = run(&p, &Config::default());
        let helpers = p.key("pkg/helpers.py");
        let closure = a.graph.all_deps(&helpers).unwrap();
        assert_eq!(closure.into_iter().collect::<Vec<_>>(), [helpers.as_str()]);
    }

    #[test]
    fn test_cycle_members_share_closure() {
        let p = sample();
        let a = run(&p, &Config::default());
        let first = a.graph.all_deps(&p.key("pkg/cycle_a.py")).unwrap();
        let second = a.graph.all_deps(&p.key("pkg/cycle_b.py")).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_fixture_is_implicit_dependency() {
        let p = sample();
        let a = run(&p, &Config::default());
        let conftest = p.key("tests/conftest.py");

        let closure = a.test_closure(&p.p("tests/test_core.py")).unwrap();
        assert!(closure.contains(conftest.as_str()));
        // through conftest -> pkg/__init__ -> helpers
        assert!(closure.contains(p.key("pkg/helpers.py").as_str()));
        // not a direct dep, not rendered
        assert_eq!(a.deps[&p.key("tests/test_core.py")], [p.key("pkg/core.py")]);
        let mut dot = Vec::new();
        a.write_dot(&mut dot).unwrap();
        let dot = String::from_utf8(dot).unwrap();
        assert!(!dot.contains(&format!("\"{}\" -> \"{}\"", p.key("tests/test_core.py"), conftest)));

        // the fixture does not depend on itself through the implicit edge only
        let own = a.graph.all_deps(&conftest).unwrap();
        assert!(!own.contains(p.key("tests/test_core.py").as_str()));
    }

    #[test]
    fn test_fixture_disabled() {
        let p = sample();
        let cfg = Config {
            fixture_file: None,
            ..Config::default()
        };
        let a = run(&p, &cfg);
        let closure = a.test_closure(&p.p("tests/test_core.py")).unwrap();
        assert!(!closure.contains(p.key("tests/conftest.py").as_str()));
    }

    #[test]
    fn test_fixture_scope_is_its_directory() {
        let p = sample();
        let a = run(&p, &Config::default());
        let closure = a.graph.all_deps(&p.key("pkg/core.py")).unwrap();
        assert!(!closure.contains(p.key("tests/conftest.py").as_str()));
    }

    #[test]
    fn test_test_closure_only_for_tests() {
        let p = sample();
        let a = run(&p, &Config::default());
        assert!(a.test_closure(&p.p("pkg/core.py")).is_none());
        assert!(a.test_closure(&p.p("tests/test_cycle.py")).is_some());
    }

    #[test]
    fn test_order_is_permutation() {
        let p = sample();
        let a = run(&p, &Config::default());
        let order = a.order();
        assert_eq!(order.len(), a.graph.len());
        let unique: BTreeSet<&str> = order.iter().copied().collect();
        assert_eq!(unique.len(), order.len());

        let pos = |rel: &str| order.iter().position(|n| *n == p.key(rel)).unwrap();
        assert!(pos("pkg/helpers.py") < pos("pkg/__init__.py"));
        assert!(pos("pkg/core.py") < pos("tests/test_core.py"));
    }

    #[test]
    fn test_describe_all_relative() {
        let p = sample();
        let a = run(&p, &Config::default());
        let lines = a.describe_all(Some(&p.root));
        assert_eq!(lines.len(), 8);
        assert!(lines.contains(&"pkg/helpers.py: pkg/helpers.py".to_string()));
        assert!(lines.contains(&"pkg/__init__.py: pkg/__init__.py, pkg/helpers.py".to_string()));
    }

    #[test]
    fn test_rerun_is_identical() {
        let p = sample();
        let first = run(&p, &Config::default());
        let second = run(&p, &Config::default());
        assert_eq!(first.deps, second.deps);
        assert_eq!(first.order(), second.order());
    }

    #[test]
    fn test_deps_serialize_as_json_object() {
        let p = sample();
        let a = run(&p, &Config::default());
        let json = serde_json::to_value(&a.deps).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        assert_eq!(
            obj[&p.key("tests/test_core.py")],
            serde_json::json!([p.key("pkg/core.py")])
        );
    }

    #[test]
    fn test_syntax_error_fails_the_run() {
        let p = Project::new(&[("ok.py", "import bad\n"), ("bad.py", "def broken(:\n")]);
        let err = analyze(&p.paths(&["ok.py", "bad.py"]), &[], &Config::default()).unwrap_err();
        match err {
            AnatomistError::Parse { path, .. } => assert_eq!(path, p.p("bad.py")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_discovered_fixture_joins_test_closure() {
        let p = Project::new(&[
            ("src/pkg/__init__.py", ""),
            ("tests/conftest.py", ""),
            ("tests/test_a.py", "import pkg\n"),
        ]);
        let cfg = Config::default();
        let files = crate::scan::discover(&[p.p("src/pkg")], &[p.p("tests")], &cfg).unwrap();
        let a = analyze(&files.tracked, &files.tests, &cfg).unwrap();

        let closure = a.test_closure(&p.p("tests/test_a.py")).unwrap();
        assert_eq!(
            closure,
            BTreeSet::from([
                p.key("src/pkg/__init__.py").as_str(),
                p.key("tests/conftest.py").as_str(),
                p.key("tests/test_a.py").as_str(),
            ])
        );
        assert!(!a.tests.contains(&p.key("tests/conftest.py")));
    }

    #[test]
    fn test_untracked_import_has_no_edge() {
        let p = Project::new(&[("a.py", "import os\nimport b\n"), ("b.py", "")]);
        let a = analyze(&p.paths(&["a.py", "b.py"]), &[], &Config::default()).unwrap();
        assert_eq!(a.deps[&p.key("a.py")], [p.key("b.py")]);
        assert_eq!(a.graph.len(), 2);
    }
}
