//! Edge-list rendering of a [`DepGraph`](crate::DepGraph).

use std::io::{self, Write};

/// Receives the statements of a rendered graph, in order.
pub trait EdgeSink {
    /// A node without direct dependencies.
    fn vertex(&mut self, name: &str) -> io::Result<()>;
    /// A direct dependency `from -> to`.
    fn edge(&mut self, from: &str, to: &str) -> io::Result<()>;
}

/// Writes statements as a Graphviz DOT digraph.
///
/// ```text
/// digraph imports {
/// "a.py" -> "b.py"
/// "b.py"
/// }
/// ```
pub struct DotWriter<W: Write> {
    out: W,
}

impl<W: Write> DotWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn begin(&mut self) -> io::Result<()> {
        writeln!(self.out, "digraph imports {{")
    }

    pub fn end(&mut self) -> io::Result<()> {
        writeln!(self.out, "}}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EdgeSink for DotWriter<W> {
    fn vertex(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, "{}", quote(name))
    }

    fn edge(&mut self, from: &str, to: &str) -> io::Result<()> {
        writeln!(self.out, "{} -> {}", quote(from), quote(to))
    }
}

/// DOT string literal; only `"` and `\` need escaping.
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Collects statements in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdgeList {
    pub vertices: Vec<String>,
    pub edges: Vec<(String, String)>,
    order: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Vertex(usize),
    Edge(usize),
}

impl EdgeList {
    /// Statements in arrival order: `"a"` for vertices, `"a -> b"` for edges.
    pub fn lines(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|stmt| match *stmt {
                Statement::Vertex(i) => self.vertices[i].clone(),
                Statement::Edge(i) => format!("{} -> {}", self.edges[i].0, self.edges[i].1),
            })
            .collect()
    }
}

impl EdgeSink for EdgeList {
    fn vertex(&mut self, name: &str) -> io::Result<()> {
        self.order.push(Statement::Vertex(self.vertices.len()));
        self.vertices.push(name.to_string());
        Ok(())
    }

    fn edge(&mut self, from: &str, to: &str) -> io::Result<()> {
        self.order.push(Statement::Edge(self.edges.len()));
        self.edges.push((from.to_string(), to.to_string()));
        Ok(())
    }
}
