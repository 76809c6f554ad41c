//! The output document graph.
//!
//! Nodes live in a flat id-keyed map; reading and display order is defined by
//! named containers (ordered id sequences), not by the map itself. Consumers
//! query by container name and node id only.

use std::collections::{BTreeMap, HashMap};

use log::warn;

use crate::graph::annotation::Annotation;
use crate::graph::node::{Node, Value};

/// Container holding the main reading-order content.
pub const CONTENT: &str = "content";
/// Container for article metadata nodes (order not significant).
pub const INFO: &str = "info";
/// Container for the reference list, in source order.
pub const CITATIONS: &str = "citations";
/// Container for figures, tables, supplements, and videos.
pub const FIGURES: &str = "figures";
/// Container for glossary definitions.
pub const DEFINITIONS: &str = "definitions";

/// A converted article: node map plus named ordered containers.
#[derive(Debug, Default)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct DocumentGraph {
    /// Document identifier, taken from the first `article-id` element.
    pub id: String,
    /// Article title with inline markup flattened to plain text.
    pub title: String,
    /// Article subtitle, when present.
    pub subtitle: String,
    /// Contributor node ids of the top-level authors, in source order.
    pub authors: Vec<String>,
    /// First publication date, as `year/month/day` fragments.
    pub created_at: Option<String>,
    /// Group authorship statement, when present.
    pub on_behalf_of: Option<String>,

    nodes: BTreeMap<String, Node>,
    annotations: Vec<Annotation>,
    containers: BTreeMap<String, Vec<String>>,

    /// Source-document id -> generated node id.
    #[cfg_attr(feature = "cli", serde(skip))]
    source_map: HashMap<String, String>,
}

impl DocumentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a node into the graph.
    ///
    /// Ids come from the per-conversion generator and are unique by
    /// construction; a duplicate here means a converter bug, so the original
    /// node is kept and the collision is reported.
    pub fn create(&mut self, node: Node) {
        if let Some(sid) = node.source_id() {
            if !sid.is_empty() {
                self.source_map
                    .entry(sid.to_string())
                    .or_insert_with(|| node.id.clone());
            }
        }
        if self.nodes.contains_key(&node.id) {
            warn!("duplicate node id {}, keeping earlier node", node.id);
            return;
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Commit an annotation. Insertion order is preserved.
    pub fn create_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Append a node id to a named container.
    pub fn show(&mut self, container: &str, id: impl Into<String>) {
        self.containers
            .entry(container.to_string())
            .or_default()
            .push(id.into());
    }

    /// Insert a node id into a named container at a position.
    pub fn show_at(&mut self, container: &str, id: impl Into<String>, position: usize) {
        let entries = self.containers.entry(container.to_string()).or_default();
        let position = position.min(entries.len());
        entries.insert(position, id.into());
    }

    /// Get a node by generated id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable node by generated id.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Look up the node created from a source-document id.
    pub fn node_by_source_id(&self, source_id: &str) -> Option<&Node> {
        self.source_map
            .get(source_id)
            .and_then(|id| self.nodes.get(id))
    }

    /// Resolve a source-document id to a generated node id.
    pub fn resolve_source_id(&self, source_id: &str) -> Option<&str> {
        self.source_map.get(source_id).map(String::as_str)
    }

    /// The ordered contents of a named container.
    pub fn container(&self, name: &str) -> &[String] {
        self.containers
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All committed annotations, in discovery order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Iterate all nodes.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The text at an annotation path, used to validate ranges.
    pub fn text_at(&self, path: &crate::graph::annotation::PropertyPath) -> Option<&str> {
        let node = self.nodes.get(&path.node)?;
        let value = node.get(&path.property)?;
        match (value, path.index) {
            (Value::Str(s), None) => Some(s.as_str()),
            (Value::List(items), Some(i)) => items.get(i).and_then(Value::as_str),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::annotation::PropertyPath;

    #[test]
    fn test_create_and_lookup() {
        let mut doc = DocumentGraph::new();
        doc.create(Node::new("paragraph_1", "paragraph").with("source_id", "p1"));

        assert!(doc.node("paragraph_1").is_some());
        assert_eq!(doc.node_by_source_id("p1").unwrap().id, "paragraph_1");
        assert_eq!(doc.resolve_source_id("p1"), Some("paragraph_1"));
    }

    #[test]
    fn test_container_order() {
        let mut doc = DocumentGraph::new();
        doc.show(CONTENT, "heading_1");
        doc.show(CONTENT, "paragraph_1");
        doc.show_at(CONTENT, "cover", 0);

        assert_eq!(doc.container(CONTENT), ["cover", "heading_1", "paragraph_1"]);
        assert!(doc.container("missing").is_empty());
    }

    #[test]
    fn test_duplicate_id_keeps_first() {
        let mut doc = DocumentGraph::new();
        doc.create(Node::new("paragraph_1", "paragraph").with("content", "first"));
        doc.create(Node::new("paragraph_1", "paragraph").with("content", "second"));

        assert_eq!(doc.len(), 1);
        assert_eq!(doc.node("paragraph_1").unwrap().get_str("content"), Some("first"));
    }

    #[test]
    fn test_text_at_indexed_path() {
        let mut doc = DocumentGraph::new();
        let mut table = Node::new("html_table_1", "html_table");
        table.push("annotated_text", "cell one");
        table.push("annotated_text", "cell two");
        doc.create(table);

        let path = PropertyPath::indexed("html_table_1", "annotated_text", 1);
        assert_eq!(doc.text_at(&path), Some("cell two"));
    }
}
