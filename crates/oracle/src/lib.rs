//! # The Oracle: Dependency Graph
//!
//! **Role**: Holds the file-level dependency graph of one analysis run and
//! answers closure and ordering queries over it.
//!
//! - [`graph`]: [`DepGraph`] construction, cycle-safe transitive closure,
//!   level-peeling topological order.
//! - [`render`]: [`EdgeSink`] statements, DOT output.
//!
//! Construction never fails and every query is total: cycles are legal.

pub mod graph;
pub mod render;

pub use graph::{DepGraph, DepKind};
pub use render::{DotWriter, EdgeList, EdgeSink};
