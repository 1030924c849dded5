//! The pipeline graph: typed nodes connected by directed edges.
//!
//! The graph is pure data.  It is populated once by the extractor and only
//! read afterwards.

use rustc_hash::FxHashMap;

/// What a node stands for, fixed by the first character of its id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A source file consumed by tasks.
    Input,
    /// A named unit of work.
    Task,
    /// An intermediate file produced by a runnable.
    Output,
    /// One concrete command belonging to a task.
    Runnable,
    /// A final deliverable produced by a runnable.
    Export,
    Unknown,
}

impl NodeKind {
    pub fn from_id(id: &str) -> NodeKind {
        match id.as_bytes().first() {
            Some(b'I') => NodeKind::Input,
            Some(b'T') => NodeKind::Task,
            Some(b'O') => NodeKind::Output,
            Some(b'R') => NodeKind::Runnable,
            Some(b'E') => NodeKind::Export,
            _ => NodeKind::Unknown,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Input => "Input",
            NodeKind::Task => "Task",
            NodeKind::Output => "Output",
            NodeKind::Runnable => "Runnable",
            NodeKind::Export => "Export",
            NodeKind::Unknown => "Unknown",
        }
    }

    /// Whether a node of this kind names a file on disk.
    pub fn is_file(self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Output | NodeKind::Export)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    /// Primary label: a file path template, a task name or a command line.
    pub content: String,
    /// Secondary label, empty when the node has none.
    pub description: String,
}

impl Node {
    pub fn new(id: impl Into<String>, content: impl Into<String>, description: impl Into<String>) -> Self {
        let id = id.into();
        Node {
            kind: NodeKind::from_id(&id),
            id,
            content: content.into(),
            description: description.into(),
        }
    }
}

/// A directed edge.  Kinds of both ends are derived from the ids when the
/// edge is created, whether or not the nodes themselves were declared.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub from_kind: NodeKind,
    pub to_kind: NodeKind,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Edge {
            from_kind: NodeKind::from_id(&from),
            to_kind: NodeKind::from_id(&to),
            from,
            to,
        }
    }

    /// Whether this edge goes between the given kinds.
    pub fn is(&self, from: NodeKind, to: NodeKind) -> bool {
        self.from_kind == from && self.to_kind == to
    }
}

#[derive(Debug, Default)]
pub struct Graph {
    /// Nodes in declaration order.
    nodes: Vec<Node>,
    by_id: FxHashMap<String, usize>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Adds a node.  A node id that was already declared keeps its first
    /// declaration; returns false in that case.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.by_id.contains_key(&node.id) {
            return false;
        }
        self.by_id.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
        true
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.by_id.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Edges ending at `id`, in declaration order.
    pub fn edges_into<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Edges starting at `id`, in declaration order.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.from == id)
    }
}
