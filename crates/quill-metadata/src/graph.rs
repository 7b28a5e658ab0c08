//! The dependency graph.
//!
//! Every cross-member reference discovered during translation is recorded
//! as an edge; the bundler later walks the graph to determine the
//! reachable code of an output.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use quill_ast::{ConstructorDef, MethodDef, TypeDef};
use rustc_hash::{FxHashMap, FxHashSet};

/// An entity that can participate in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Method(TypeDef, MethodDef),
    AbstractMethod(TypeDef, MethodDef),
    Constructor(TypeDef, ConstructorDef),
    Implementation(TypeDef, TypeDef, MethodDef),
    Type(TypeDef),
    Assembly(String, bool),
    EntryPoint,
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Method(t, m) => write!(f, "{}.{}", t, m.name),
            Node::AbstractMethod(t, m) => write!(f, "abstract {}.{}", t, m.name),
            Node::Constructor(t, _) => write!(f, "{}..ctor", t),
            Node::Implementation(t, i, m) => write!(f, "{}:{}.{}", t, i, m.name),
            Node::Type(t) => write!(f, "{}", t),
            Node::Assembly(n, _) => write!(f, "assembly {}", n),
            Node::EntryPoint => write!(f, "<entry point>"),
        }
    }
}

/// Directed dependency graph over [`Node`]s.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<Node, ()>,
    indices: FxHashMap<Node, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, node: Node) -> NodeIndex {
        if let Some(&ix) = self.indices.get(&node) {
            return ix;
        }
        let ix = self.graph.add_node(node.clone());
        self.indices.insert(node, ix);
        ix
    }

    /// Record that `from` depends on `to`. Parallel edges are deduplicated.
    pub fn add_edge(&mut self, from: Node, to: Node) {
        let a = self.intern(from);
        let b = self.intern(to);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Whether the edge `from → to` has been recorded.
    pub fn has_edge(&self, from: &Node, to: &Node) -> bool {
        match (self.indices.get(from), self.indices.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every node reachable from `from`, including itself.
    pub fn reachable_from(&self, from: &Node) -> FxHashSet<Node> {
        let mut out = FxHashSet::default();
        let Some(&start) = self.indices.get(from) else {
            return out;
        };
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(ix) = dfs.next(&self.graph) {
            out.insert(self.graph[ix].clone());
        }
        out
    }
}
