//! Graph extraction: walks a parsed diagram and populates the pipeline graph.

use crate::graph::{Edge, Graph, Node, NodeKind};
use crate::parse::{self, Declaration, Diagram, EdgeDecl, NodeDecl};
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Marker splitting a node label into content and description.
pub const BREAK_MARKER: &str = "<br/>";

/// Style statements, kept only for display.
#[derive(Debug, Default)]
pub struct Styles {
    pub class_defs: Vec<(String, String)>,
    pub class_assignments: Vec<(Vec<String>, String)>,
}

/// A diagram after extraction.
#[derive(Debug, Default)]
pub struct Document {
    pub direction: String,
    pub init: Option<String>,
    pub graph: Graph,
    pub styles: Styles,
    /// Number of declarations that were dropped.
    pub skipped: usize,
}

/// Splits a raw label into (content, description).
pub fn split_label(text: &str) -> (String, String) {
    match text.split_once(BREAK_MARKER) {
        Some((content, rest)) => {
            // Anything after a second marker is ignored.
            let description = rest.split(BREAK_MARKER).next().unwrap_or("");
            (content.trim().to_owned(), description.trim().to_owned())
        }
        None => (text.trim().to_owned(), String::new()),
    }
}

fn node_from_decl(decl: &NodeDecl) -> Result<Node, String> {
    let (content, description) = match &decl.shape {
        None => (decl.id.clone(), String::new()),
        Some(shape) => split_label(&shape.text),
    };
    if content.is_empty() {
        return Err(format!("node {} has an empty label", decl.id));
    }
    Ok(Node::new(decl.id.clone(), content, description))
}

fn edge_from_decl(decl: &EdgeDecl) -> Result<Edge, String> {
    let mut ids = decl
        .children
        .iter()
        .filter(|tok| NodeKind::from_id(tok) != NodeKind::Unknown);
    match (ids.next(), ids.next()) {
        (Some(from), Some(to)) => Ok(Edge::new(from.as_str(), to.as_str())),
        _ => Err(format!(
            "edge {:?} does not connect two pipeline nodes",
            decl.children.join(" ")
        )),
    }
}

pub fn extract(diagram: Diagram) -> Document {
    let mut doc = Document {
        direction: diagram.direction,
        init: diagram.init,
        ..Document::default()
    };
    for decl in diagram.declarations {
        match decl {
            Declaration::Node(decl) => match node_from_decl(&decl) {
                Ok(node) => {
                    if !doc.graph.add_node(node) {
                        debug!(line = decl.line, id = %decl.id, "node redeclared, keeping first");
                    }
                }
                Err(msg) => {
                    warn!(line = decl.line, "skipping declaration: {}", msg);
                    doc.skipped += 1;
                }
            },
            Declaration::Edge(decl) => match edge_from_decl(&decl) {
                Ok(edge) => doc.graph.add_edge(edge),
                Err(msg) => {
                    warn!(line = decl.line, "skipping declaration: {}", msg);
                    doc.skipped += 1;
                }
            },
            Declaration::ClassDef { name, props } => doc.styles.class_defs.push((name, props)),
            Declaration::ClassAssign { nodes, class } => {
                doc.styles.class_assignments.push((nodes, class))
            }
            Declaration::Malformed { line, msg } => {
                warn!(line, "skipping declaration: {}", msg);
                doc.skipped += 1;
            }
        }
    }
    doc
}

/// Reads, parses and extracts a diagram file.
pub fn load(path: &Path) -> anyhow::Result<Document> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let diagram = parse::parse(path, &text)?;
    Ok(extract(diagram))
}

const DISPLAY_KINDS: [(NodeKind, &str); 5] = [
    (NodeKind::Input, "Inputs"),
    (NodeKind::Task, "Tasks"),
    (NodeKind::Output, "Outputs"),
    (NodeKind::Runnable, "Runnables"),
    (NodeKind::Export, "Exports"),
];

/// Prints a human-readable analysis of the document.
pub fn display(doc: &Document, w: &mut dyn Write) -> std::io::Result<()> {
    let graph = &doc.graph;
    writeln!(w, "direction: {}", doc.direction)?;
    if let Some(init) = &doc.init {
        writeln!(w, "init: {}", init)?;
    }

    for (kind, title) in DISPLAY_KINDS {
        let mut nodes = graph.nodes_of_kind(kind).peekable();
        if nodes.peek().is_none() {
            continue;
        }
        writeln!(w, "\n{}:", title)?;
        for node in nodes {
            writeln!(w, "  {}: {}", node.id, node.content)?;
            if !node.description.is_empty() {
                writeln!(w, "    description: {}", node.description)?;
            }
            if matches!(kind, NodeKind::Task | NodeKind::Runnable) {
                let ins: Vec<&str> = graph.edges_into(&node.id).map(|e| e.from.as_str()).collect();
                if !ins.is_empty() {
                    writeln!(w, "    inputs: {}", ins.join(", "))?;
                }
                let outs: Vec<&str> = graph.edges_from(&node.id).map(|e| e.to.as_str()).collect();
                if !outs.is_empty() {
                    writeln!(w, "    outputs: {}", outs.join(", "))?;
                }
            }
        }
    }

    if !graph.edges().is_empty() {
        writeln!(w, "\nrelationships:")?;
        for edge in graph.edges() {
            writeln!(w, "  {} --> {}", edge.from, edge.to)?;
        }
    }
    if !doc.styles.class_defs.is_empty() {
        writeln!(w, "\nstyle definitions:")?;
        for (name, props) in &doc.styles.class_defs {
            writeln!(w, "  {}: {}", name, props)?;
        }
    }
    if !doc.styles.class_assignments.is_empty() {
        writeln!(w, "\nstyle assignments:")?;
        for (nodes, class) in &doc.styles.class_assignments {
            writeln!(w, "  {}: {}", class, nodes.join(", "))?;
        }
    }

    writeln!(w, "\nsummary:")?;
    writeln!(w, "  nodes: {}", graph.nodes().len())?;
    writeln!(w, "  edges: {}", graph.edges().len())?;
    writeln!(w, "  style definitions: {}", doc.styles.class_defs.len())?;
    writeln!(w, "  style assignments: {}", doc.styles.class_assignments.len())?;
    if doc.skipped > 0 {
        writeln!(w, "  skipped declarations: {}", doc.skipped)?;
    }
    for (kind, title) in DISPLAY_KINDS {
        let count = graph.nodes_of_kind(kind).count();
        if count > 0 {
            writeln!(w, "  {}: {}", title.to_lowercase(), count)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_str(text: &str) -> Document {
        extract(parse::parse(Path::new("test.mmd"), text).unwrap())
    }

    #[test]
    fn split_label_variants() {
        assert_eq!(split_label("  a.ly "), ("a.ly".to_owned(), String::new()));
        assert_eq!(
            split_label("make_pdf<br/>  Render the score "),
            ("make_pdf".to_owned(), "Render the score".to_owned())
        );
        assert_eq!(
            split_label("x<br/>first<br/>second"),
            ("x".to_owned(), "first".to_owned())
        );
    }

    #[test]
    fn nodes_and_edges() {
        let doc = extract_str(
            "graph TD\nI1[BWV000.ly] --> T1[compile<br/>Compile it]\nT1 --> R1[lilypond  BWV000.ly]\nR1 --> O1[BWV000.pdf]\nT9\n",
        );
        let graph = &doc.graph;
        assert_eq!(graph.nodes().len(), 5);
        let t1 = graph.node("T1").unwrap();
        assert_eq!(t1.kind, NodeKind::Task);
        assert_eq!(t1.content, "compile");
        assert_eq!(t1.description, "Compile it");
        assert_eq!(graph.node("R1").unwrap().content, "lilypond  BWV000.ly");
        let t9 = graph.node("T9").unwrap();
        assert_eq!(t9.content, "T9");
        assert_eq!(t9.description, "");
        let edges: Vec<(&str, &str)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .collect();
        assert_eq!(edges, vec![("I1", "T1"), ("T1", "R1"), ("R1", "O1")]);
        assert_eq!(doc.skipped, 0);
    }

    #[test]
    fn bad_declarations_are_skipped() {
        let doc = extract_str("graph TD\nT1[]\nA1 --> T2\nT3[ok\nT4[fine]\n");
        assert_eq!(doc.skipped, 3);
        assert!(doc.graph.node("T1").is_none());
        assert!(doc.graph.edges().is_empty());
        assert_eq!(doc.graph.node("T4").unwrap().content, "fine");
    }

    #[test]
    fn styles_do_not_touch_graph() {
        let doc = extract_str("graph TD\nclassDef io fill:#eee\nclass I1,O1 io\nI1[a] --> T1[b]\n");
        assert_eq!(doc.styles.class_defs, vec![("io".to_owned(), "fill:#eee".to_owned())]);
        assert_eq!(doc.styles.class_assignments.len(), 1);
        assert_eq!(doc.graph.nodes().len(), 2);
        assert_eq!(doc.graph.edges().len(), 1);
    }

    #[test]
    fn display_lists_everything() {
        let doc = extract_str("graph LR\nI1[a.ly] --> T1[compile]\nT1 --> R1[cmd]\nR1 --> E1[a.pdf<br/>Score]\n");
        let mut out = Vec::new();
        display(&doc, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("direction: LR"));
        assert!(out.contains("  T1: compile\n    inputs: I1\n    outputs: R1\n"));
        assert!(out.contains("  E1: a.pdf\n    description: Score\n"));
        assert!(out.contains("  R1 --> E1\n"));
        assert!(out.contains("  exports: 1\n"));
    }
}
