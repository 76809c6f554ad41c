//! Block-level assemblers: paragraphs, sections, lists, boxes, quotes,
//! formulas, and the body-node dispatch loop they hang off.

use log::{debug, info, warn};

use crate::graph::{CONTENT, FIGURES, Node, PropertyPath, Value};
use crate::import::Importer;
use crate::import::dispatch::BlockKind;
use crate::import::state::{Frame, State};
use crate::import::text::{ChildCursor, ExtractOptions};
use crate::xml::{XmlDom, XmlNodeId};

/// A segmented run of paragraph content: either a run of inline children or
/// an embedded block element that becomes a sibling node.
enum Segment {
    Inline(Vec<XmlNodeId>),
    Block(BlockKind, XmlNodeId),
}

impl Importer {
    /// Convert a sequence of block-level child elements.
    ///
    /// `ignore` lists tags the caller handles itself (titles, labels);
    /// deferred tags (figures et al.) are left for their dedicated sweeps.
    pub(crate) fn body_nodes(
        &self,
        state: &mut State,
        dom: &XmlDom,
        children: &[XmlNodeId],
        ignore: &[&str],
    ) -> Vec<String> {
        self.body_nodes_opts(state, dom, children, ignore, false)
    }

    pub(crate) fn body_nodes_opts(
        &self,
        state: &mut State,
        dom: &XmlDom,
        children: &[XmlNodeId],
        ignore: &[&str],
        captions_without_title: bool,
    ) -> Vec<String> {
        let mut nodes = Vec::new();

        for &child in children {
            let Some(tag) = dom.element_name(child) else {
                continue;
            };

            match self.dispatch.block_kind(tag) {
                Some(BlockKind::Paragraph) | Some(BlockKind::Attrib) => {
                    nodes.extend(self.paragraph_group(state, dom, child));
                }
                Some(BlockKind::Section) => {
                    nodes.extend(self.section(state, dom, child));
                }
                Some(BlockKind::List) => {
                    nodes.push(self.list(state, dom, child));
                }
                Some(BlockKind::Formula) => {
                    nodes.push(self.formula(state, dom, child, false));
                }
                Some(BlockKind::Caption) => {
                    nodes.push(self.caption(state, dom, child, captions_without_title));
                }
                Some(BlockKind::BoxedText) => {
                    nodes.push(self.boxed_text(state, dom, child));
                }
                Some(BlockKind::Quote) => {
                    nodes.push(self.quote_text(state, dom, child));
                }
                Some(BlockKind::Comment) => {
                    // Comments are not represented in the article model.
                }
                Some(BlockKind::Figure) => {
                    if let Some(id) = self.figure(state, dom, child) {
                        nodes.push(id);
                    }
                }
                Some(BlockKind::FigureGroup) => {
                    nodes.push(self.figure_group(state, dom, child));
                }
                None => {
                    if ignore.contains(&tag) || self.dispatch.is_deferred_block(tag) {
                        // Deferred tags are processed in an extra pass
                        // (figures, tables, footnotes).
                        continue;
                    }
                    warn!("element not supported at block level: <{}>", tag);
                }
            }
        }
        nodes
    }

    /// Append nodes to their display containers, in order.
    pub(crate) fn show_nodes(&self, state: &mut State, node_ids: &[String]) {
        for id in node_ids {
            let container = match state.doc.node(id).map(|n| n.kind.as_str()) {
                Some("figure") | Some("figure_group") | Some("html_table") | Some("video")
                | Some("supplement") => FIGURES,
                _ => CONTENT,
            };
            state.doc.show(container, id.clone());
        }
    }

    /// Convert a `<p>`-like element.
    ///
    /// A source paragraph may legally embed block-level constructs; its
    /// children are segmented into inline runs and embedded blocks first, so
    /// each inline run becomes one paragraph node and each embedded block a
    /// sibling node in source order.
    pub(crate) fn paragraph_group(
        &self,
        state: &mut State,
        dom: &XmlDom,
        paragraph: XmlNodeId,
    ) -> Vec<String> {
        let source_id = dom.element_id(paragraph).map(|s| s.to_string());
        let mut nodes = Vec::new();

        for segment in self.segment_paragraph(dom, paragraph) {
            match segment {
                Segment::Inline(run) => {
                    if let Some(id) = self.paragraph(state, dom, &run, source_id.as_deref()) {
                        nodes.push(id);
                    }
                }
                Segment::Block(kind, el) => {
                    let node = match kind {
                        BlockKind::BoxedText => Some(self.boxed_text(state, dom, el)),
                        BlockKind::Quote => Some(self.quote_text(state, dom, el)),
                        BlockKind::List => Some(self.list(state, dom, el)),
                        BlockKind::Formula => Some(self.formula(state, dom, el, false)),
                        _ => None,
                    };
                    nodes.extend(node);
                }
            }
        }
        nodes
    }

    /// Segment a paragraph's children into inline runs and embedded blocks.
    fn segment_paragraph(&self, dom: &XmlDom, paragraph: XmlNodeId) -> Vec<Segment> {
        let mut segments: Vec<Segment> = Vec::new();

        for child in dom.children(paragraph) {
            if let Some(tag) = dom.element_name(child) {
                if self.dispatch.is_ignored_paragraph_child(tag) {
                    continue;
                }
                if let Some(kind) = self.dispatch.embedded_block_kind(tag) {
                    segments.push(Segment::Block(kind, child));
                    continue;
                }
            } else if dom.text(child).is_none() {
                // Comment node.
                continue;
            }
            match segments.last_mut() {
                Some(Segment::Inline(run)) => run.push(child),
                _ => segments.push(Segment::Inline(vec![child])),
            }
        }
        segments
    }

    /// Build one paragraph node from a run of inline children.
    ///
    /// Returns `None` when the run produces no content at all.
    pub(crate) fn paragraph(
        &self,
        state: &mut State,
        dom: &XmlDom,
        children: &[XmlNodeId],
        source_id: Option<&str>,
    ) -> Option<String> {
        // Whitespace at the beginning of a paragraph is removed rigorously.
        state.reset_whitespace();

        let paragraph_id = state.next_id("paragraph");
        let mut child_ids: Vec<String> = Vec::new();

        let mut cursor = ChildCursor::from_children(children.to_vec());
        while let Some(child) = cursor.next() {
            let is_text = dom.is_text(child);
            let tag = dom.element_name(child).unwrap_or("");

            if is_text || self.dispatch.is_annotation(tag) || self.dispatch.is_inline_node(tag) {
                let text_id = state.next_id("text");
                state.push_frame(Frame {
                    path: PropertyPath::new(&text_id, "content"),
                    ignore: Vec::new(),
                });
                // Consume as many textish children as possible; the walk
                // returns at the first unknown element, which stays in the
                // cursor for this loop to reprocess.
                cursor.back();
                let pending_before = state.annotations.len();
                let content = self.annotated_text_inner(
                    state,
                    dom,
                    &mut cursor,
                    ExtractOptions {
                        offset: 0,
                        nested: false,
                        break_on_unknown: true,
                        ..Default::default()
                    },
                );
                state.pop_frame();

                // Keep the node if it has text, or if annotations were
                // queued against it (empty reference-only runs).
                if !content.is_empty() || state.annotations.len() > pending_before {
                    state
                        .doc
                        .create(Node::new(&text_id, "text").with("content", content));
                    child_ids.push(text_id);
                }
            } else if tag == "inline-graphic" {
                let url = dom.get_attr(child, "xlink:href").unwrap_or("");
                let image_id = state.next_id("image");
                let node = Node::new(&image_id, "image").with("url", self.resolve_url(dom, url));
                state.doc.create(node);
                child_ids.push(image_id);
            } else {
                debug!("skipping <{}> inside paragraph content", tag);
            }
        }

        if child_ids.is_empty() {
            return None;
        }

        let mut node = Node::new(&paragraph_id, "paragraph").with("children", string_list(&child_ids));
        if let Some(sid) = source_id {
            node.set("source_id", sid);
        }
        state.doc.create(node);
        Some(paragraph_id)
    }

    /// Convert a `<sec>` element: body nodes plus a heading for the title at
    /// the current nesting depth.
    pub(crate) fn section(&self, state: &mut State, dom: &XmlDom, section: XmlNodeId) -> Vec<String> {
        state.section_level += 1;

        let children: Vec<_> = dom.children(section).collect();
        let label = dom.direct_children(section, "label").into_iter().next();
        let title = dom.direct_children(section, "title").into_iter().next();
        if title.is_none() {
            warn!("section without title: <sec id={:?}>", dom.element_id(section));
        }

        let mut nodes = self.body_nodes(state, dom, &children, &["title", "label"]);

        if !nodes.is_empty() || title.is_some() {
            let id = state.next_id("heading");
            let content = match title {
                Some(t) => self.annotated_text(state, dom, t, PropertyPath::new(&id, "content"), &[]),
                None => String::new(),
            };

            if !content.is_empty() {
                let mut heading = Node::new(&id, "heading")
                    .with("level", state.section_level as i64)
                    .with("content", content);
                if let Some(sid) = dom.element_id(section) {
                    heading.set("source_id", sid);
                }
                if let Some(label_el) = label {
                    heading.set("label", dom.text_content(label_el));
                }
                state.doc.create(heading);
                nodes.insert(0, id);
            }
        } else {
            info!(
                "skipping section without content: {:?}",
                title.map(|t| dom.text_content(t))
            );
        }

        state.section_level -= 1;
        nodes
    }

    /// Convert a `<list>` element.
    ///
    /// The labels array stays parallel to the item array: an item that
    /// contributes more than one body node pads with nulls after its label.
    pub(crate) fn list(&self, state: &mut State, dom: &XmlDom, list: XmlNodeId) -> String {
        let list_id = state.next_id("list");
        let list_type = self.dispatch.list_type(dom.get_attr(list, "list-type"));

        let mut items: Vec<Value> = Vec::new();
        let mut labels: Vec<Value> = Vec::new();

        for item in dom.direct_children(list, "list-item") {
            let label = dom.direct_children(item, "label").into_iter().next();
            labels.push(match label {
                Some(l) => Value::Str(dom.text_content(l)),
                None => Value::Null,
            });

            let item_children: Vec<_> = dom.children(item).collect();
            let nodes = self.body_nodes(state, dom, &item_children, &["label"]);
            for (j, node_id) in nodes.into_iter().enumerate() {
                if j > 0 {
                    labels.push(Value::Null);
                }
                items.push(Value::Str(node_id));
            }
        }

        let mut node = Node::new(&list_id, "list")
            .with("list_type", list_type)
            .with("items", items)
            .with("labels", labels);
        if let Some(sid) = dom.element_id(list) {
            node.set("source_id", sid);
        }
        state.doc.create(node);
        list_id
    }

    /// Convert a `<boxed-text>` element.
    pub(crate) fn boxed_text(&self, state: &mut State, dom: &XmlDom, box_el: XmlNodeId) -> String {
        let children: Vec<_> = dom.children(box_el).collect();
        let child_nodes = self.body_nodes(state, dom, &children, &[]);
        let box_id = state.next_id("box");

        let mut node = Node::new(&box_id, "box")
            .with("label", "")
            .with("children", string_list(&child_nodes));
        if let Some(sid) = dom.element_id(box_el) {
            node.set("source_id", sid);
        }
        state.doc.create(node);
        box_id
    }

    /// Convert a `<disp-quote>` element.
    pub(crate) fn quote_text(&self, state: &mut State, dom: &XmlDom, quote: XmlNodeId) -> String {
        let children: Vec<_> = dom.children(quote).collect();
        let child_nodes = self.body_nodes(state, dom, &children, &[]);
        let quote_id = state.next_id("quote");

        let mut node = Node::new(&quote_id, "quote")
            .with("label", "")
            .with("children", string_list(&child_nodes));
        if let Some(sid) = dom.element_id(quote) {
            node.set("source_id", sid);
        }
        state.doc.create(node);
        quote_id
    }

    /// Convert a `<disp-formula>` or `<inline-formula>` element.
    pub(crate) fn formula(
        &self,
        state: &mut State,
        dom: &XmlDom,
        formula: XmlNodeId,
        inline: bool,
    ) -> String {
        let formula_id = state.next_id("formula");

        let mut data: Vec<Value> = Vec::new();
        let mut format: Vec<Value> = Vec::new();
        let mut label = String::new();

        for child in dom.child_elements(formula) {
            let Some(tag) = dom.element_name(child) else {
                continue;
            };
            match tag {
                "graphic" | "inline-graphic" => {
                    let url = dom.get_attr(child, "xlink:href").unwrap_or("");
                    format.push(Value::Str("image".to_string()));
                    data.push(Value::Str(self.resolve_url(dom, url)));
                }
                "svg" => {
                    format.push(Value::Str("svg".to_string()));
                    data.push(Value::Str(dom.outer_xml(child)));
                }
                "mml:math" | "math" => {
                    format.push(Value::Str("mathml".to_string()));
                    data.push(Value::Str(strip_mml_prefix(&dom.outer_xml(child))));
                }
                "tex-math" => {
                    format.push(Value::Str("latex".to_string()));
                    data.push(Value::Str(dom.text_content(child)));
                }
                "label" => label = dom.text_content(child),
                _ => warn!("unsupported formula element: <{}>", tag),
            }
        }

        let mut node = Node::new(&formula_id, "formula")
            .with("label", label)
            .with("inline", inline)
            .with("data", data)
            .with("format", format);
        if let Some(sid) = dom.element_id(formula) {
            node.set("source_id", sid);
        }
        state.doc.create(node);
        formula_id
    }
}

/// Turn a list of ids into a Value list.
pub(crate) fn string_list(ids: &[String]) -> Vec<Value> {
    ids.iter().map(|id| Value::Str(id.clone())).collect()
}

/// MathML payloads are carried without their namespace prefix.
fn strip_mml_prefix(markup: &str) -> String {
    markup.replace("<mml:", "<").replace("</mml:", "</")
}
