//! # File Dependency Graph
//!
//! Nodes are file paths (or arbitrary labels); an edge `a -> b` means `a`
//! depends on `b`. Cycles and self-loops are legal.
//!
//! **Closure**: the reachable set of a node (itself included) is computed on
//! the condensation of the graph. Every strongly connected component gets one
//! compute-once cell, so all members of a cycle share one closure and
//! concurrent queries never compute the same component twice. The walk over
//! the condensation uses an explicit stack, so deep chains cannot overflow.

use crate::render::{DotWriter, EdgeSink};
use common::paths::display_relative;
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::path::Path;
use std::sync::OnceLock;

/// Origin of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    /// Produced by an import statement. Rendered.
    Direct,
    /// Added outside the import relation (fixture files). Only affects closures
    /// and ordering.
    Implicit,
}

#[derive(Debug, Default)]
pub struct DepGraph {
    graph: DiGraph<String, DepKind>,
    index: HashMap<String, NodeIndex>,
    condensed: OnceLock<Condensation>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from `name -> [direct dep names]`.
    ///
    /// Names only appearing as dependencies become nodes without outgoing
    /// edges. Repeated dependencies collapse into one edge.
    pub fn from_deps<K, V, D>(deps: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: IntoIterator<Item = D>,
        D: AsRef<str>,
    {
        let mut graph = Self::new();
        for (name, targets) in deps {
            graph.get_or_create(name.as_ref());
            for dep in targets {
                graph.add_dep(name.as_ref(), dep.as_ref());
            }
        }
        tracing::debug!(
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "built dependency graph"
        );
        graph
    }

    /// Returns the node for `name`, creating it when missing.
    pub fn get_or_create(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.condensed.take();
        idx
    }

    /// Records that `node` imports `dep`.
    pub fn add_dep(&mut self, node: &str, dep: &str) {
        self.add_edge(node, dep, DepKind::Direct);
    }

    /// Records that `node` implicitly depends on `dep`.
    pub fn add_implicit_dep(&mut self, node: &str, dep: &str) {
        self.add_edge(node, dep, DepKind::Implicit);
    }

    fn add_edge(&mut self, node: &str, dep: &str, kind: DepKind) {
        let from = self.get_or_create(node);
        let to = self.get_or_create(dep);
        if self
            .graph
            .edges_connecting(from, to)
            .any(|edge| *edge.weight() == kind)
        {
            return;
        }
        self.graph.add_edge(from, to, kind);
        self.condensed.take();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All node names, sorted.
    pub fn nodes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.graph.node_weights().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Sorted direct (import) dependencies of `name`.
    pub fn direct_deps(&self, name: &str) -> Option<Vec<&str>> {
        let idx = *self.index.get(name)?;
        Some(self.targets(idx, Some(DepKind::Direct)).into_keys().collect())
    }

    /// Everything `name` depends on, directly or transitively, through
    /// direct and implicit edges. Always contains `name` itself.
    pub fn all_deps(&self, name: &str) -> Option<BTreeSet<&str>> {
        let idx = *self.index.get(name)?;
        let condensed = self.condensed.get_or_init(|| Condensation::build(&self.graph));
        let closure = condensed.closure(condensed.component[idx.index()]);
        Some(closure.iter().map(|&n| self.graph[n].as_str()).collect())
    }

    /// Orders all nodes so that dependencies come before their dependents.
    ///
    /// Nodes are emitted level by level: a level holds every node whose
    /// dependencies were all emitted already, sorted by name. When a cycle
    /// leaves no such node, the pending nodes with the fewest unemitted
    /// dependencies form the next level.
    pub fn topological_order(&self) -> Vec<&str> {
        let count = self.graph.node_count();
        let mut remaining: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.targets(idx, None).len())
            .collect();
        let mut emitted = vec![false; count];
        let mut order = Vec::with_capacity(count);

        while order.len() < count {
            let pending: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|idx| !emitted[idx.index()])
                .collect();
            let Some(min) = pending.iter().map(|idx| remaining[idx.index()]).min() else {
                break;
            };
            if min > 0 {
                tracing::trace!(remaining = min, "breaking dependency cycle");
            }
            let mut level: Vec<NodeIndex> = pending
                .into_iter()
                .filter(|idx| remaining[idx.index()] == min)
                .collect();
            level.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

            for &idx in &level {
                emitted[idx.index()] = true;
            }
            for &idx in &level {
                order.push(self.graph[idx].as_str());
                let dependents: BTreeSet<NodeIndex> = self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .collect();
                for dependent in dependents {
                    if !emitted[dependent.index()] {
                        remaining[dependent.index()] = remaining[dependent.index()].saturating_sub(1);
                    }
                }
            }
        }

        order
    }

    /// Feeds the direct edges to `sink`: nodes in name order, a vertex for
    /// nodes without direct deps, otherwise one edge per dep in name order.
    pub fn render<S: EdgeSink>(&self, sink: &mut S) -> io::Result<()> {
        for name in self.nodes() {
            let idx = self.index[name];
            let deps = self.targets(idx, Some(DepKind::Direct));
            if deps.is_empty() {
                sink.vertex(name)?;
            }
            for dep in deps.into_keys() {
                sink.edge(name, dep)?;
            }
        }
        Ok(())
    }

    /// Writes the direct edges in DOT format.
    pub fn write_dot<W: io::Write>(&self, out: W) -> io::Result<()> {
        let mut dot = DotWriter::new(out);
        dot.begin()?;
        self.render(&mut dot)?;
        dot.end()
    }

    /// `"<name>: <dep>, <dep>, ..."` with the closure sorted and every path
    /// shown relative to `base`.
    pub fn describe(&self, name: &str, base: Option<&Path>) -> Option<String> {
        let mut deps: Vec<String> = self
            .all_deps(name)?
            .into_iter()
            .map(|dep| display_relative(dep, base))
            .collect();
        deps.sort_unstable();
        Some(format!("{}: {}", display_relative(name, base), deps.join(", ")))
    }

    /// Distinct outgoing neighbours of `idx`, keyed and sorted by name.
    fn targets(&self, idx: NodeIndex, kind: Option<DepKind>) -> BTreeMap<&str, NodeIndex> {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|edge| kind.map_or(true, |k| *edge.weight() == k))
            .map(|edge| (self.graph[edge.target()].as_str(), edge.target()))
            .collect()
    }
}

/// Strongly connected components of the graph and their cached closures.
#[derive(Debug)]
struct Condensation {
    /// Node index -> component id.
    component: Vec<usize>,
    members: Vec<Vec<NodeIndex>>,
    /// Distinct successor components, self excluded.
    successors: Vec<Vec<usize>>,
    closures: Vec<OnceLock<Vec<NodeIndex>>>,
}

impl Condensation {
    fn build(graph: &DiGraph<String, DepKind>) -> Self {
        let members = kosaraju_scc(graph);
        let mut component = vec![0; graph.node_count()];
        for (id, scc) in members.iter().enumerate() {
            for node in scc {
                component[node.index()] = id;
            }
        }

        let successors = members
            .iter()
            .enumerate()
            .map(|(id, scc)| {
                let targets: BTreeSet<usize> = scc
                    .iter()
                    .flat_map(|&node| graph.neighbors_directed(node, Direction::Outgoing))
                    .map(|target| component[target.index()])
                    .filter(|&target| target != id)
                    .collect();
                targets.into_iter().collect()
            })
            .collect();

        let closures = members.iter().map(|_| OnceLock::new()).collect();
        tracing::trace!(components = members.len(), "condensed dependency graph");

        Self {
            component,
            members,
            successors,
            closures,
        }
    }

    /// Sorted closure of component `root`, computing missing successor
    /// closures first in post-order.
    fn closure(&self, root: usize) -> &[NodeIndex] {
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if self.closures[id].get().is_some() {
                continue;
            }
            if expanded {
                self.closures[id].get_or_init(|| self.splice(id));
            } else {
                stack.push((id, true));
                stack.extend(
                    self.successors[id]
                        .iter()
                        .filter(|&&succ| self.closures[succ].get().is_none())
                        .map(|&succ| (succ, false)),
                );
            }
        }
        self.closures[root].get_or_init(|| self.splice(root))
    }

    /// Members of `id` plus the cached closures of its successors.
    fn splice(&self, id: usize) -> Vec<NodeIndex> {
        let mut set: BTreeSet<NodeIndex> = self.members[id].iter().copied().collect();
        for &succ in &self.successors[id] {
            if let Some(sub) = self.closures[succ].get() {
                set.extend(sub.iter().copied());
            }
        }
        set.into_iter().collect()
    }
}
