//! # The Anatomist: Import Extraction & Resolution
//!
//! **Role**: Turns a set of tracked Python files into the file-level
//! dependency map consumed by the Oracle's graph.
//!
//! **Stages**:
//! - [`imports`]: Tree-sitter walk yielding one [`RawImport`] per imported name.
//! - [`namespace`]: Path-walking package detection and fully-qualified names.
//! - [`module_set`]: The tracked universe, indexed by path and dotted name.
//! - [`resolve`]: Raw imports → tracked dependency paths.
//! - [`scan`]: Discovery of tracked and test files under watch paths.
//! - [`pipeline`]: One full analysis run.
//!
//! **Design**:
//! - No global state: every run builds a fresh [`ModuleSet`] and passes it down.
//! - Imports pointing outside the tracked set are dropped, never reported.
//! - The only hard failure of a file is a syntax error ([`AnatomistError::Parse`]).

pub mod imports;
pub mod module_set;
pub mod namespace;
pub mod path_util;
pub mod pipeline;
pub mod resolve;
pub mod scan;

pub use imports::{find_imports, find_imports_in_source, ImportExtractor, RawImport};
pub use module_set::{ModuleSet, TrackedModule};
pub use pipeline::{analyze, Analysis};
pub use scan::SourceFiles;

use std::path::PathBuf;

/// Errors produced by the Anatomist crate.
#[derive(Debug, thiserror::Error)]
pub enum AnatomistError {
    /// The file is not valid Python source.
    #[error("{}:{line}:{column}: syntax error: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Two tracked files map to the same fully-qualified module name.
    #[error("duplicate module name `{name}`: {} and {}", .first.display(), .second.display())]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// I/O error (file read, directory walk).
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Python grammar could not be loaded into tree-sitter.
    #[error("failed to load Python grammar: {0}")]
    Grammar(String),

    /// Byte range exceeds u32::MAX (file too large).
    #[error("Byte range overflow: file size exceeds 4GB limit")]
    ByteRangeOverflow,
}

impl AnatomistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnatomistError::Io {
            path: path.into(),
            source,
        }
    }
}
