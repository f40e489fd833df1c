//! # Import Resolution
//!
//! Maps raw import records of one module onto tracked files of a
//! [`ModuleSet`]. Anything that does not land on a tracked file (standard
//! library, third-party packages, typos) is dropped without error.

use crate::imports::{find_imports, RawImport};
use crate::module_set::{ModuleSet, TrackedModule};
use crate::AnatomistError;
use common::PACKAGE_MARKER;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::trace;

/// Extracts and resolves the imports of `module`.
///
/// # Errors
/// Propagates extraction failures of the module's own file.
pub fn resolve(
    module: &TrackedModule,
    modules: &ModuleSet,
) -> Result<BTreeSet<PathBuf>, AnatomistError> {
    let raw = find_imports(module.path())?;
    Ok(resolve_raw(module, &raw, modules))
}

/// Resolves already-extracted imports of `module`.
pub fn resolve_raw(
    module: &TrackedModule,
    imports: &[RawImport],
    modules: &ModuleSet,
) -> BTreeSet<PathBuf> {
    let mut deps = BTreeSet::new();
    for import in imports {
        match resolve_one(module, import, modules) {
            Some(target) => {
                deps.insert(target.path().to_path_buf());
            }
            None => trace!(
                module = %module.dotted_name(),
                line = import.line,
                name = %import.imported_name,
                "import outside tracked set"
            ),
        }
    }
    deps
}

/// Resolves a single import record to the tracked module it refers to.
fn resolve_one<'m>(
    module: &TrackedModule,
    import: &RawImport,
    modules: &'m ModuleSet,
) -> Option<&'m TrackedModule> {
    let full = joined_name(import);

    if let Some(level) = import.level.filter(|&l| l > 0) {
        // intra-package import: anchor on the module's own name
        let fqn = module.fqn();
        let keep = fqn.len().saturating_sub(level as usize);
        let mut segments: Vec<&str> = fqn[..keep].iter().map(String::as_str).collect();
        if !full.is_empty() {
            segments.push(&full);
        }
        return lookup(modules, None, &segments.join("."));
    }

    if full.is_empty() {
        return None;
    }

    // old-style implicit relative imports, innermost package first; the
    // first hit wins even when it is the importing module itself
    module
        .enclosing_packages()
        .find_map(|pkg| lookup(modules, Some(pkg.as_str()), &full))
        .or_else(|| lookup(modules, None, &full))
}

/// Dotted name formed by the `from` part and the imported name.
///
/// A wildcard contributes nothing, so `from a import *` resolves only to `a`.
fn joined_name(import: &RawImport) -> String {
    let mut parts = Vec::with_capacity(2);
    if let Some(from) = import.from_module.as_deref().filter(|s| !s.is_empty()) {
        parts.push(from);
    }
    if !import.is_wildcard() && !import.imported_name.is_empty() {
        parts.push(import.imported_name.as_str());
    }
    parts.join(".")
}

/// Finds the module a dotted name refers to, optionally under `prefix`.
///
/// Tries, in order: the exact name; the name without its last segment (the
/// imported object is not a module); then either of those as a tracked
/// package, which resolves to the package's `__init__` module. The last
/// segment is stripped from `name` before `prefix` is applied, so a prefixed
/// lookup never falls back to the prefix package itself.
fn lookup<'m>(
    modules: &'m ModuleSet,
    prefix: Option<&str>,
    name: &str,
) -> Option<&'m TrackedModule> {
    let qualify = |n: &str| -> Option<String> {
        match (prefix, n.is_empty()) {
            (_, true) => None,
            (Some(pkg), false) => Some(format!("{}.{}", pkg, n)),
            (None, false) => Some(n.to_string()),
        }
    };

    let exact = qualify(name)?;
    let stripped = match name.rsplit_once('.') {
        Some((head, _)) => qualify(head),
        None if prefix.is_none() => Some(exact.clone()),
        None => None,
    };

    if let Some(module) = modules.by_name(&exact) {
        return Some(module);
    }
    if let Some(module) = stripped.as_deref().and_then(|n| modules.by_name(n)) {
        return Some(module);
    }

    let package_root = [Some(exact.as_str()), stripped.as_deref()]
        .into_iter()
        .flatten()
        .filter(|candidate| modules.packages().contains(*candidate))
        .find_map(|pkg| modules.by_name(&format!("{}.{}", pkg, PACKAGE_MARKER)));
    package_root
}
