//! # Tracked Module Universe
//!
//! A [`ModuleSet`] indexes every tracked file by path and by dotted name.
//! It is built once per analysis run and is read-only afterwards, apart from
//! each module's compute-once import cache, so it can be shared across
//! threads resolving different files.

use crate::namespace::fully_qualified_name;
use crate::resolve::resolve;
use crate::AnatomistError;
use common::PACKAGE_MARKER;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One watched source file.
#[derive(Debug)]
pub struct TrackedModule {
    path: PathBuf,
    fqn: Vec<String>,
    imports: OnceLock<BTreeSet<PathBuf>>,
}

impl TrackedModule {
    /// Creates a module, computing its fully-qualified name from the file system.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let fqn = fully_qualified_name(&path);
        Self {
            path,
            fqn,
            imports: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name segments, outermost package first.
    pub fn fqn(&self) -> &[String] {
        &self.fqn
    }

    pub fn dotted_name(&self) -> String {
        self.fqn.join(".")
    }

    /// Returns `true` if this is a package's `__init__` module.
    pub fn is_package_root(&self) -> bool {
        self.fqn.last().is_some_and(|s| s == PACKAGE_MARKER)
    }

    /// Dotted names of the packages enclosing this module, innermost first.
    ///
    /// `foo.sub.sub_a` yields `foo.sub`, then `foo`.
    pub fn enclosing_packages(&self) -> impl Iterator<Item = String> + '_ {
        (1..self.fqn.len()).rev().map(|end| self.fqn[..end].join("."))
    }

    /// Resolved dependency paths, if already computed.
    pub fn imports(&self) -> Option<&BTreeSet<PathBuf>> {
        self.imports.get()
    }
}

/// The universe of tracked files for one analysis run.
#[derive(Debug, Default)]
pub struct ModuleSet {
    by_path: BTreeMap<PathBuf, TrackedModule>,
    by_name: HashMap<String, PathBuf>,
    packages: BTreeSet<String>,
}

impl ModuleSet {
    /// Builds the set. Repeated paths collapse into one module.
    ///
    /// # Errors
    /// `DuplicateName` if two distinct paths share a fully-qualified name.
    pub fn new<I, P>(paths: I) -> Result<Self, AnatomistError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut set = ModuleSet::default();

        for path in paths {
            let path = path.into();
            if set.by_path.contains_key(&path) {
                continue;
            }

            let module = TrackedModule::new(path.clone());
            let name = module.dotted_name();
            if let Some(first) = set.by_name.get(&name) {
                return Err(AnatomistError::DuplicateName {
                    name,
                    first: first.clone(),
                    second: path,
                });
            }

            if module.is_package_root() {
                set.packages
                    .insert(module.fqn[..module.fqn.len() - 1].join("."));
            }
            set.by_name.insert(name, path.clone());
            set.by_path.insert(path, module);
        }

        Ok(set)
    }

    pub fn get(&self, path: &Path) -> Option<&TrackedModule> {
        self.by_path.get(path)
    }

    /// Looks up a module by its exact dotted name.
    pub fn by_name(&self, name: &str) -> Option<&TrackedModule> {
        self.by_name.get(name).and_then(|path| self.by_path.get(path))
    }

    /// Dotted names of tracked packages (those whose `__init__` is tracked).
    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Modules in path order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedModule> {
        self.by_path.values()
    }

    /// Resolved dependency paths of `module`, computed on first request.
    ///
    /// # Errors
    /// Propagates the extraction error of the module's own file. A failed
    /// attempt caches nothing, so a later call parses the file again.
    pub fn imports_of<'a>(
        &'a self,
        module: &'a TrackedModule,
    ) -> Result<&'a BTreeSet<PathBuf>, AnatomistError> {
        if let Some(done) = module.imports.get() {
            return Ok(done);
        }
        let resolved = resolve(module, self)?;
        Ok(module.imports.get_or_init(|| resolved))
    }
}
