//! # Import Extraction
//!
//! Walks the whole Python syntax tree (not just the module level) and emits one
//! [`RawImport`] per imported name, in source order. Imports nested inside
//! functions, classes, conditionals and `try` blocks are included.

use crate::AnatomistError;
use memmap2::MmapOptions;
use std::fs::File;
use std::path::Path;
use tree_sitter::{Node, Parser};

/// One imported name as written in the source.
///
/// | statement                  | `from_module` | `imported_name` | `level`   |
/// |----------------------------|---------------|-----------------|-----------|
/// | `import a.b as c`          | `None`        | `"a.b"`         | `None`    |
/// | `from a import b`          | `Some("a")`   | `"b"`           | `Some(0)` |
/// | `from ..a import *`        | `Some("a")`   | `"*"`           | `Some(2)` |
/// | `from . import b`          | `None`        | `"b"`           | `Some(1)` |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImport {
    /// Module part of a `from` statement. `None` for plain imports and bare `from .`.
    pub from_module: Option<String>,
    /// The imported module or object name (`"*"` for wildcard imports).
    pub imported_name: String,
    /// `as` name, if any.
    pub alias: Option<String>,
    /// Leading dot count of a `from` statement. `None` for plain imports.
    pub level: Option<u32>,
    /// Line number (1-indexed).
    pub line: u32,
}

impl RawImport {
    /// The record without its line number, for positional comparisons.
    pub fn as_tuple(&self) -> (Option<&str>, &str, Option<&str>, Option<u32>) {
        (
            self.from_module.as_deref(),
            &self.imported_name,
            self.alias.as_deref(),
            self.level,
        )
    }

    pub fn is_wildcard(&self) -> bool {
        self.imported_name == "*"
    }

    /// Returns `true` for `from` imports with at least one leading dot.
    pub fn is_relative(&self) -> bool {
        self.level.is_some_and(|level| level > 0)
    }
}

/// Reusable tree-sitter parser for import extraction.
pub struct ImportExtractor {
    parser: Parser,
}

impl ImportExtractor {
    /// Creates a new extractor with the Python grammar loaded.
    pub fn new() -> Result<Self, AnatomistError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AnatomistError::Grammar(e.to_string()))?;
        Ok(Self { parser })
    }

    /// Extracts the imports of a file on disk using memory-mapped I/O.
    ///
    /// # Errors
    /// - `Io`: file not found, permission denied, mmap failure
    /// - `ByteRangeOverflow`: file larger than 4GB
    /// - `Parse`: syntax error or non-UTF-8 content
    pub fn extract(&mut self, path: &Path) -> Result<Vec<RawImport>, AnatomistError> {
        let file = File::open(path).map_err(|e| AnatomistError::io(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| AnatomistError::io(path, e))?
            .len();

        if file_len > u32::MAX as u64 {
            return Err(AnatomistError::ByteRangeOverflow);
        }
        if file_len == 0 {
            return Ok(Vec::new());
        }

        // SAFETY: The file handle is held for the duration of the mmap lifetime.
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| AnatomistError::io(path, e))?;
        self.extract_source(&mmap[..], path)
    }

    /// Extracts the imports of an in-memory source buffer.
    ///
    /// `path` is only used to label errors.
    pub fn extract_source(
        &mut self,
        source: &[u8],
        path: &Path,
    ) -> Result<Vec<RawImport>, AnatomistError> {
        if let Err(e) = std::str::from_utf8(source) {
            let (line, column) = position_of(source, e.valid_up_to());
            return Err(AnatomistError::Parse {
                path: path.to_path_buf(),
                line,
                column,
                message: "source is not valid UTF-8".to_string(),
            });
        }

        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| AnatomistError::Parse {
                path: path.to_path_buf(),
                line: 1,
                column: 1,
                message: "tree-sitter parse returned None".to_string(),
            })?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(syntax_error(source, root, path));
        }

        let mut imports = Vec::new();
        walk_preorder(root, |node| match node.kind() {
            "import_statement" => {
                plain_import(source, node, &mut imports);
                false
            }
            "import_from_statement" | "future_import_statement" => {
                from_import(source, node, &mut imports);
                false
            }
            _ => true,
        });
        Ok(imports)
    }
}

/// Extracts the imports of one file with a throwaway parser.
///
/// # Examples
/// ```no_run
/// use anatomist::find_imports;
/// use std::path::Path;
///
/// for import in find_imports(Path::new("pkg/mod.py")).unwrap() {
///     println!("{:?}", import.as_tuple());
/// }
/// ```
pub fn find_imports(path: &Path) -> Result<Vec<RawImport>, AnatomistError> {
    ImportExtractor::new()?.extract(path)
}

/// Same as [`find_imports`] for a source buffer; `label` names it in errors.
pub fn find_imports_in_source(
    source: &[u8],
    label: &Path,
) -> Result<Vec<RawImport>, AnatomistError> {
    ImportExtractor::new()?.extract_source(source, label)
}

/// Pre-order traversal; `visit` returns whether to descend into the node.
fn walk_preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) {
    let mut cursor = root.walk();
    loop {
        if visit(cursor.node()) && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// `import a.b, c as d`
fn plain_import(source: &[u8], node: Node, out: &mut Vec<RawImport>) {
    let line = node.start_position().row as u32 + 1;
    let mut cursor = node.walk();
    for name_node in node.children_by_field_name("name", &mut cursor) {
        if let Some((name, alias)) = name_and_alias(source, name_node) {
            out.push(RawImport {
                from_module: None,
                imported_name: name,
                alias,
                level: None,
                line,
            });
        }
    }
}

/// `from ..a import b as c`, `from a import *`, `from __future__ import x`
fn from_import(source: &[u8], node: Node, out: &mut Vec<RawImport>) {
    let line = node.start_position().row as u32 + 1;

    let (from_module, level) = if node.kind() == "future_import_statement" {
        (Some("__future__".to_string()), 0)
    } else {
        match node.child_by_field_name("module_name") {
            Some(module) if module.kind() == "relative_import" => relative_module(source, module),
            Some(module) => (dotted_text(source, module), 0),
            None => (None, 0),
        }
    };

    let mut names = Vec::new();
    let mut cursor = node.walk();
    if node
        .children(&mut cursor)
        .any(|child| child.kind() == "wildcard_import")
    {
        names.push(("*".to_string(), None));
    } else {
        let mut cursor = node.walk();
        for name_node in node.children_by_field_name("name", &mut cursor) {
            if let Some(pair) = name_and_alias(source, name_node) {
                names.push(pair);
            }
        }
    }

    out.extend(names.into_iter().map(|(name, alias)| RawImport {
        from_module: from_module.clone(),
        imported_name: name,
        alias,
        level: Some(level),
        line,
    }));
}

/// Splits a `relative_import` node into its dotted module part and dot count.
fn relative_module(source: &[u8], node: Node) -> (Option<String>, u32) {
    let mut module = None;
    let mut level = 0;
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "import_prefix" => {
                level = child
                    .utf8_text(source)
                    .map(|t| t.chars().filter(|&c| c == '.').count() as u32)
                    .unwrap_or(0);
            }
            "dotted_name" => module = dotted_text(source, child),
            _ => {}
        }
    }
    (module, level)
}

fn name_and_alias(source: &[u8], node: Node) -> Option<(String, Option<String>)> {
    if node.kind() == "aliased_import" {
        let name = dotted_text(source, node.child_by_field_name("name")?)?;
        let alias = node
            .child_by_field_name("alias")
            .and_then(|a| a.utf8_text(source).ok())
            .map(str::to_string);
        Some((name, alias))
    } else {
        Some((dotted_text(source, node)?, None))
    }
}

/// Text of a `dotted_name`, with any whitespace inside it removed.
fn dotted_text(source: &[u8], node: Node) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let name: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    (!name.is_empty()).then_some(name)
}

/// Builds a `Parse` error pointing at the first error or missing node.
fn syntax_error(source: &[u8], root: Node, path: &Path) -> AnatomistError {
    let mut culprit = None;
    walk_preorder(root, |node| {
        if culprit.is_some() {
            return false;
        }
        if node.is_error() || node.is_missing() {
            culprit = Some(node);
            return false;
        }
        node.has_error()
    });

    let node = culprit.unwrap_or(root);
    let pos = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let snippet: String = node
            .utf8_text(source)
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(40)
            .collect();
        format!("unexpected `{}`", snippet.trim())
    };

    AnatomistError::Parse {
        path: path.to_path_buf(),
        line: pos.row + 1,
        column: pos.column + 1,
        message,
    }
}

/// 1-indexed (line, column) of a byte offset.
fn position_of(source: &[u8], offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = before.iter().rev().take_while(|&&b| b != b'\n').count() + 1;
    (line, column)
}
