//! Arena-based read-only XML tree.
//!
//! All nodes are stored in a contiguous vector for cache-friendly traversal.
//! Parent/child/sibling links use indices into this vector. Elements with an
//! `id` attribute are registered in a lookup map so that reference resolution
//! can find source elements in O(1).

use std::collections::HashMap;

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XmlNodeId(pub u32);

impl XmlNodeId {
    /// Sentinel value for no node.
    pub const NONE: XmlNodeId = XmlNodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the XML arena.
#[derive(Debug, Clone)]
pub enum XmlNodeData {
    /// Document root.
    Document,
    /// Element with tag name and attributes.
    Element {
        name: String,
        attrs: Vec<XmlAttribute>,
        /// Pre-extracted id for fast lookup.
        id: Option<String>,
    },
    /// Text content.
    Text(String),
    /// Comment (kept for fidelity, skipped by traversal helpers).
    Comment(String),
}

/// XML attribute.
#[derive(Debug, Clone)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
}

/// A node in the XML arena.
#[derive(Debug)]
pub struct XmlNode {
    pub data: XmlNodeData,
    pub parent: XmlNodeId,
    pub first_child: XmlNodeId,
    pub last_child: XmlNodeId,
    pub prev_sibling: XmlNodeId,
    pub next_sibling: XmlNodeId,
}

impl XmlNode {
    fn new(data: XmlNodeData) -> Self {
        Self {
            data,
            parent: XmlNodeId::NONE,
            first_child: XmlNodeId::NONE,
            last_child: XmlNodeId::NONE,
            prev_sibling: XmlNodeId::NONE,
            next_sibling: XmlNodeId::NONE,
        }
    }
}

/// Arena-based XML document tree.
pub struct XmlDom {
    nodes: Vec<XmlNode>,
    document: XmlNodeId,
    /// Map from id attribute to node ID for fast lookup.
    id_map: HashMap<String, XmlNodeId>,
}

impl XmlDom {
    /// Create a new empty tree with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: XmlNodeId::NONE,
            id_map: HashMap::new(),
        };
        dom.document = dom.alloc(XmlNode::new(XmlNodeData::Document));
        dom
    }

    fn alloc(&mut self, node: XmlNode) -> XmlNodeId {
        let id = XmlNodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the document root ID.
    pub fn document(&self) -> XmlNodeId {
        self.document
    }

    /// Get a node by ID.
    pub fn get(&self, id: XmlNodeId) -> Option<&XmlNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: XmlNodeId) -> Option<&mut XmlNode> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node.
    pub fn create_element(&mut self, name: String, attrs: Vec<XmlAttribute>) -> XmlNodeId {
        let id = attrs
            .iter()
            .find(|a| a.name == "id")
            .map(|a| a.value.clone());

        let node_id = self.alloc(XmlNode::new(XmlNodeData::Element {
            name,
            attrs,
            id: id.clone(),
        }));

        if let Some(id_str) = id {
            // First occurrence wins, as in DOM getElementById.
            self.id_map.entry(id_str).or_insert(node_id);
        }

        node_id
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: String) -> XmlNodeId {
        self.alloc(XmlNode::new(XmlNodeData::Text(text)))
    }

    /// Create a new comment node.
    pub fn create_comment(&mut self, text: String) -> XmlNodeId {
        self.alloc(XmlNode::new(XmlNodeData::Comment(text)))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: XmlNodeId, child: XmlNodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(XmlNodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some() {
            if let Some(last_node) = self.get_mut(last_child) {
                last_node.next_sibling = child;
            }
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: XmlNodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(XmlNodeId::NONE);

        if let Some(last) = self.get_mut(last_child) {
            if let XmlNodeData::Text(ref mut existing) = last.data {
                existing.push_str(text);
                return;
            }
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    /// Get an element by its id attribute.
    pub fn get_by_id(&self, id: &str) -> Option<XmlNodeId> {
        self.id_map.get(id).copied()
    }

    /// Get the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree is empty (only has the document root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: XmlNodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(XmlNodeId::NONE);
        ChildrenIter {
            dom: self,
            current: first,
        }
    }

    /// Iterate over child elements of a node (skips text and comments).
    pub fn child_elements(&self, parent: XmlNodeId) -> impl Iterator<Item = XmlNodeId> + '_ {
        self.children(parent).filter(|&id| self.is_element(id))
    }

    /// Iterate over all descendants of a node in document order, excluding the node itself.
    pub fn descendants(&self, root: XmlNodeId) -> DescendantsIter<'_> {
        let mut stack: Vec<XmlNodeId> = self.children(root).collect();
        stack.reverse();
        DescendantsIter { dom: self, stack }
    }

    /// Find the first element matching a predicate (document order).
    pub fn find<F>(&self, root: XmlNodeId, predicate: F) -> Option<XmlNodeId>
    where
        F: Fn(XmlNodeId) -> bool,
    {
        self.descendants(root)
            .find(|&id| self.is_element(id) && predicate(id))
    }

    /// Find the first descendant element with the given tag name.
    pub fn find_by_tag(&self, root: XmlNodeId, tag: &str) -> Option<XmlNodeId> {
        self.find(root, |id| self.element_name(id) == Some(tag))
    }

    /// Collect all descendant elements with the given tag name.
    pub fn find_all_by_tag(&self, root: XmlNodeId, tag: &str) -> Vec<XmlNodeId> {
        self.descendants(root)
            .filter(|&id| self.element_name(id) == Some(tag))
            .collect()
    }

    /// Find the first direct child element with the given tag name.
    pub fn direct_child(&self, parent: XmlNodeId, tag: &str) -> Option<XmlNodeId> {
        self.child_elements(parent)
            .find(|&id| self.element_name(id) == Some(tag))
    }

    /// Collect all direct child elements with the given tag name.
    pub fn direct_children(&self, parent: XmlNodeId, tag: &str) -> Vec<XmlNodeId> {
        self.child_elements(parent)
            .filter(|&id| self.element_name(id) == Some(tag))
            .collect()
    }
}

impl Default for XmlDom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    dom: &'a XmlDom,
    current: XmlNodeId,
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = XmlNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(XmlNodeId::NONE);
        Some(id)
    }
}

/// Depth-first iterator over descendants.
pub struct DescendantsIter<'a> {
    dom: &'a XmlDom,
    stack: Vec<XmlNodeId>,
}

impl<'a> Iterator for DescendantsIter<'a> {
    type Item = XmlNodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let mut children: Vec<_> = self.dom.children(id).collect();
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}

/// Convenience methods for element nodes.
impl XmlDom {
    /// Get element's tag name.
    pub fn element_name(&self, id: XmlNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            XmlNodeData::Element { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Get an attribute value.
    pub fn get_attr(&self, id: XmlNodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            XmlNodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Get element's id attribute.
    pub fn element_id(&self, id: XmlNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            XmlNodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    /// List an element's attributes.
    pub fn attributes(&self, id: XmlNodeId) -> &[XmlAttribute] {
        self.get(id)
            .and_then(|n| match &n.data {
                XmlNodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: XmlNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, XmlNodeData::Element { .. }))
    }

    /// Check if node is a text node.
    pub fn is_text(&self, id: XmlNodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, XmlNodeData::Text(_)))
    }

    /// Get the raw content of a text node.
    pub fn text(&self, id: XmlNodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            XmlNodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text content of a subtree, like DOM textContent.
    pub fn text_content(&self, id: XmlNodeId) -> String {
        let mut out = String::new();
        if let Some(t) = self.text(id) {
            out.push_str(t);
        }
        for child in self.descendants(id) {
            if let Some(t) = self.text(child) {
                out.push_str(t);
            }
        }
        out
    }

    /// Serialize a subtree back to markup, for payloads that are carried
    /// verbatim (MathML, SVG).
    pub fn outer_xml(&self, id: XmlNodeId) -> String {
        let mut out = String::new();
        self.write_xml(id, &mut out);
        out
    }

    fn write_xml(&self, id: XmlNodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            XmlNodeData::Document => {
                for child in self.children(id) {
                    self.write_xml(child, out);
                }
            }
            XmlNodeData::Element { name, attrs, .. } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                }
                if node.first_child.is_none() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in self.children(id) {
                        self.write_xml(child, out);
                    }
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
            XmlNodeData::Text(text) => out.push_str(&escape_text(text)),
            XmlNodeData::Comment(_) => {}
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
