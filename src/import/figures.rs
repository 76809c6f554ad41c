//! Figure-ish resources: figures, figure groups, tables, supplements, and
//! videos, plus their captions.
//!
//! These elements may legally occur anywhere including appendices, so they
//! are collected in whole-document sweeps after the main body walk; the
//! consumed-element set keeps the sweeps from reprocessing anything a body
//! handler already converted.

use log::warn;

use crate::graph::{Node, PropertyPath, Value};
use crate::import::Importer;
use crate::import::blocks::string_list;
use crate::import::citations::is_referenced;
use crate::import::state::State;
use crate::xml::{XmlDom, XmlNodeId};

impl Importer {
    /// Catch-all sweep over the entire document for figure-ish content.
    pub(crate) fn extract_figures(&self, state: &mut State, dom: &XmlDom) {
        let mut nodes: Vec<String> = Vec::new();

        for el in dom.descendants(dom.document()) {
            let Some(tag) = dom.element_name(el) else {
                continue;
            };
            if state.is_consumed(el) {
                continue;
            }
            let node = match tag {
                "fig" => self.figure(state, dom, el),
                "table-wrap" => Some(self.table_wrap(state, dom, el)),
                "supplementary-material" => Some(self.supplement(state, dom, el)),
                "media" if dom.get_attr(el, "mimetype") == Some("video") => {
                    Some(self.video(state, dom, el))
                }
                _ => None,
            };
            nodes.extend(node);
        }

        self.show_nodes(state, &nodes);
    }

    /// Convert a `<fig>` element. Thumbnails are not part of the article.
    pub(crate) fn figure(&self, state: &mut State, dom: &XmlDom, figure: XmlNodeId) -> Option<String> {
        if dom.get_attr(figure, "fig-type") == Some("thumb") || state.is_consumed(figure) {
            return None;
        }

        let figure_id = state.next_id("figure");
        let source_id = dom.element_id(figure);

        let mut node = Node::new(&figure_id, "figure")
            .with("label", "")
            .with("urls", Vec::<Value>::new())
            .with("caption", None::<String>)
            .with("referenced", is_referenced_outside_figures(dom, source_id));
        if let Some(sid) = source_id {
            node.set("source_id", sid);
        }

        if let Some(label_el) = dom.find_by_tag(figure, "label") {
            let label =
                self.annotated_text(state, dom, label_el, PropertyPath::new(&figure_id, "label"), &[]);
            node.set("label", label);
        }

        // A figure always carries a caption node, even when the source has
        // none, so downstream consumers can rely on its presence.
        let caption_id = match dom.find_by_tag(figure, "caption") {
            Some(caption_el) => self.caption(state, dom, caption_el, false),
            None => {
                let id = state.next_id("caption");
                state.doc.create(
                    Node::new(&id, "caption")
                        .with("source_id", "")
                        .with("title", "")
                        .with("children", Vec::<Value>::new()),
                );
                id
            }
        };
        self.ensure_caption_children(state, &caption_id);
        node.set("caption", caption_id);

        if let Some(attrib) = dom.find_by_tag(figure, "attrib") {
            node.set("attrib", dom.text_content(attrib));
        }
        if let Some(position) = dom.get_attr(figure, "position") {
            node.set("position", position);
        }

        // Graphic urls resolve against the document base URL.
        let graphics = dom.find_all_by_tag(figure, "graphic");
        if graphics.is_empty() {
            warn!("figure without graphic: {:?}", source_id);
        }
        for graphic in graphics {
            if let Some(url) = dom.get_attr(graphic, "xlink:href") {
                node.push("urls", self.resolve_url(dom, url));
            }
        }

        self.hooks.figure(&mut node, dom, figure);
        state.doc.create(node);
        state.consume(figure);

        Some(figure_id)
    }

    /// Convert a `<fig-group>` element grouping related figures.
    pub(crate) fn figure_group(&self, state: &mut State, dom: &XmlDom, group: XmlNodeId) -> String {
        let children: Vec<_> = dom.children(group).collect();
        // Captions encountered among the children lose their title; the
        // group-level caption keeps it.
        let child_nodes = self.body_nodes_opts(state, dom, &children, &[], true);

        let group_id = state.next_id("figure_group");
        let source_id = dom.element_id(group);

        let mut node = Node::new(&group_id, "figure_group")
            .with("position", "float")
            .with("orientation", "portrait")
            .with("caption", None::<String>)
            .with("children", string_list(&child_nodes))
            .with("referenced", is_referenced(dom, source_id));
        if let Some(sid) = source_id {
            node.set("source_id", sid);
        }

        let direct_label = dom.direct_children(group, "label").into_iter().next();
        let label_el = direct_label.or_else(|| {
            dom.find_by_tag(group, "caption")
                .and_then(|c| dom.find_by_tag(c, "title"))
        });
        if let Some(label_el) = label_el {
            let label =
                self.annotated_text(state, dom, label_el, PropertyPath::new(&group_id, "label"), &[]);
            node.set("label", label);
        }

        if let Some(caption_el) = dom.find_by_tag(group, "caption") {
            let caption_id = self.caption(state, dom, caption_el, false);
            node.set("caption", caption_id);
        }

        if let Some(position) = dom.get_attr(group, "position") {
            node.set("position", position);
        }
        if let Some(orientation) = dom.get_attr(group, "orientation") {
            node.set("orientation", orientation);
        }

        state.doc.create(node);
        state.consume(group);
        group_id
    }

    /// Convert a `<table-wrap>` element into an html_table node carrying the
    /// table structure with per-cell annotated text.
    pub(crate) fn table_wrap(&self, state: &mut State, dom: &XmlDom, wrap: XmlNodeId) -> String {
        let table_id = state.next_id("html_table");
        let source_id = dom.element_id(wrap);

        let label = dom
            .find_by_tag(wrap, "label")
            .map(|l| dom.text_content(l))
            .unwrap_or_else(|| "Table".to_string());

        let mut node = Node::new(&table_id, "html_table")
            .with("title", "")
            .with("label", label)
            .with("content", "")
            .with("caption", None::<String>)
            .with("footers", Vec::<Value>::new());
        if let Some(sid) = source_id {
            node.set("source_id", sid);
        }

        let tables = dom.find_all_by_tag(wrap, "table");
        let mut cell_texts: Vec<Value> = Vec::new();
        if !tables.is_empty() {
            let mut merged: Option<(String, Vec<Value>, Vec<Value>)> = None;
            for table in tables {
                let converted =
                    self.table_tree(state, dom, table, &table_id, &mut cell_texts);
                let (name, attrs, children) = into_table_parts(converted);
                merged = Some(match merged {
                    None => (name, attrs, children),
                    Some((n, a, mut c)) => {
                        c.extend(children);
                        (n, a, c)
                    }
                });
            }
            if let Some((name, attrs, children)) = merged {
                let mut map = std::collections::BTreeMap::new();
                map.insert("name".to_string(), Value::Str(name));
                map.insert("attributes".to_string(), Value::List(attrs));
                map.insert("children".to_string(), Value::List(children));
                node.set("table", Value::Map(map));
            }
        }
        node.set("annotated_text", cell_texts);

        if let Some(image) = dom.find_by_tag(wrap, "graphic") {
            if let Some(url) = dom.get_attr(image, "xlink:href") {
                node.set("image", self.resolve_url(dom, url));
            }
        }

        match dom.find_by_tag(wrap, "caption") {
            Some(caption_el) => {
                let caption_id = self.caption(state, dom, caption_el, false);
                node.set("caption", caption_id);
            }
            None => warn!("table-wrap without caption: {:?}", source_id),
        }

        self.hooks.table(&mut node, dom, wrap);
        state.doc.create(node);
        state.consume(wrap);
        table_id
    }

    /// Recursively convert a table subtree; cell contents become entries in
    /// the table node's indexed annotated-text list.
    fn table_tree(
        &self,
        state: &mut State,
        dom: &XmlDom,
        el: XmlNodeId,
        table_node_id: &str,
        cell_texts: &mut Vec<Value>,
    ) -> Value {
        let name = dom.element_name(el).unwrap_or("").to_string();
        let attrs: Vec<Value> = dom
            .attributes(el)
            .iter()
            .map(|a| {
                let mut map = std::collections::BTreeMap::new();
                map.insert("name".to_string(), Value::Str(a.name.clone()));
                map.insert("value".to_string(), Value::Str(a.value.clone()));
                Value::Map(map)
            })
            .collect();

        let mut map = std::collections::BTreeMap::new();
        map.insert("name".to_string(), Value::Str(name.clone()));
        map.insert("attributes".to_string(), Value::List(attrs));

        if name == "td" || name == "th" {
            let index = cell_texts.len();
            let path = PropertyPath::indexed(table_node_id, "annotated_text", index);
            let text = self.annotated_text(state, dom, el, path, &[]);
            cell_texts.push(Value::Str(text));
        } else {
            let children: Vec<Value> = dom
                .child_elements(el)
                .collect::<Vec<_>>()
                .into_iter()
                .map(|child| self.table_tree(state, dom, child, table_node_id, cell_texts))
                .collect();
            map.insert("children".to_string(), Value::List(children));
        }
        Value::Map(map)
    }

    /// Convert a `<supplementary-material>` element.
    pub(crate) fn supplement(&self, state: &mut State, dom: &XmlDom, supplement: XmlNodeId) -> String {
        let supplement_id = state.next_id("supplement");

        let label = dom
            .find_by_tag(supplement, "label")
            .map(|l| dom.text_content(l))
            .unwrap_or_default();
        let url = dom
            .find_by_tag(supplement, "media")
            .and_then(|m| dom.get_attr(m, "xlink:href"))
            .map(|u| u.to_string());

        let mut node = Node::new(&supplement_id, "supplement")
            .with("label", label)
            .with("url", url)
            .with("caption", None::<String>);
        if let Some(sid) = dom.element_id(supplement) {
            node.set("source_id", sid);
        }

        if let Some(caption_el) = dom.find_by_tag(supplement, "caption") {
            let caption_id = self.caption(state, dom, caption_el, false);
            node.set("caption", caption_id);
        }

        self.hooks.supplement(&mut node, dom, supplement);
        state.doc.create(node);
        state.consume(supplement);
        supplement_id
    }

    /// Convert a `<media mimetype="video">` element, deriving the standard
    /// set of rendition urls from the source file name.
    pub(crate) fn video(&self, state: &mut State, dom: &XmlDom, video: XmlNodeId) -> String {
        let video_id = state.next_id("video");

        let label = dom
            .find_by_tag(video, "label")
            .map(|l| dom.text_content(l))
            .unwrap_or_default();

        let mut node = Node::new(&video_id, "video")
            .with("label", label)
            .with("title", "")
            .with("caption", None::<String>)
            .with("poster", "");
        if let Some(sid) = dom.element_id(video) {
            node.set("source_id", sid);
        }

        if let Some(caption_el) = dom.find_by_tag(video, "caption") {
            let caption_id = self.caption(state, dom, caption_el, false);
            node.set("caption", caption_id);
        }

        if let Some(href) = dom.get_attr(video, "xlink:href") {
            let stem = href.rsplit_once('.').map(|(s, _)| s).unwrap_or(href);
            let base = if href.starts_with("http:") || href.starts_with("https:") {
                stem.to_string()
            } else {
                format!("{}{}", self.base_url(dom), stem)
            };
            node.set("url", format!("{}.mp4", base));
            node.set("url_ogv", format!("{}.ogv", base));
            node.set("url_webm", format!("{}.webm", base));
            node.set("poster", format!("{}.png", base));
        }

        self.hooks.video(&mut node, dom, video);
        state.doc.create(node);
        state.consume(video);
        video_id
    }

    /// Convert a `<caption>` element, used by figures, tables, videos, and
    /// supplements. Titles can be annotated, so they delegate to the
    /// paragraph assembler.
    pub(crate) fn caption(
        &self,
        state: &mut State,
        dom: &XmlDom,
        caption: XmlNodeId,
        ignore_title: bool,
    ) -> String {
        let caption_id = state.next_id("caption");

        let mut node = Node::new(&caption_id, "caption").with("title", "");
        if let Some(sid) = dom.element_id(caption) {
            node.set("source_id", sid);
        }

        if !ignore_title {
            if let Some(title) = dom.find_by_tag(caption, "title") {
                let title_children: Vec<_> = dom.children(title).collect();
                if let Some(title_node) = self.paragraph(state, dom, &title_children, None) {
                    node.set("title", title_node);
                }
            }
        }

        let mut children: Vec<String> = Vec::new();
        for p in dom.direct_children(caption, "p") {
            let p_children: Vec<_> = dom.children(p).collect();
            if let Some(id) = self.paragraph(state, dom, &p_children, dom.element_id(p)) {
                children.push(id);
            }
        }
        node.set("children", string_list(&children));

        state.doc.create(node);
        caption_id
    }

    /// A caption always exposes at least one (possibly empty) text child.
    fn ensure_caption_children(&self, state: &mut State, caption_id: &str) {
        let empty = state
            .doc
            .node(caption_id)
            .and_then(|n| n.get("children"))
            .and_then(Value::as_list)
            .is_none_or(|children| children.is_empty());
        if empty {
            let text_id = state.next_id("text");
            state
                .doc
                .create(Node::new(&text_id, "text").with("content", ""));
            if let Some(caption) = state.doc.node_mut(caption_id) {
                caption.push("children", text_id);
            }
        }
    }

    /// Resolve a possibly-relative media reference against the document
    /// base URL.
    pub(crate) fn resolve_url(&self, dom: &XmlDom, url: &str) -> String {
        if url.starts_with("http:") || url.starts_with("https:") {
            return url.to_string();
        }
        format!("{}{}", self.base_url(dom), url)
    }

    /// The base URL for relative references: the article's `xml:base`
    /// attribute when present, the configured base URL otherwise.
    pub(crate) fn base_url(&self, dom: &XmlDom) -> String {
        dom.find_by_tag(dom.document(), "article")
            .and_then(|a| dom.get_attr(a, "xml:base"))
            .map(|b| b.to_string())
            .or_else(|| self.options.base_url.clone())
            .unwrap_or_default()
    }
}

/// Whether a cross-reference *outside* any figure points at this source id.
/// References between figures do not count as an in-text mention.
fn is_referenced_outside_figures(dom: &XmlDom, source_id: Option<&str>) -> bool {
    let Some(source_id) = source_id else {
        return false;
    };
    dom.descendants(dom.document()).any(|el| {
        dom.element_name(el) == Some("xref")
            && dom.get_attr(el, "rid") == Some(source_id)
            && !has_ancestor_tag(dom, el, "fig")
    })
}

/// Whether an element has an ancestor with the given tag name.
pub(crate) fn has_ancestor_tag(dom: &XmlDom, el: XmlNodeId, tag: &str) -> bool {
    let mut current = dom.get(el).map(|n| n.parent);
    while let Some(parent) = current {
        if parent.is_none() {
            return false;
        }
        if dom.element_name(parent) == Some(tag) {
            return true;
        }
        current = dom.get(parent).map(|n| n.parent);
    }
    false
}

fn into_table_parts(value: Value) -> (String, Vec<Value>, Vec<Value>) {
    match value {
        Value::Map(mut map) => {
            let name = match map.remove("name") {
                Some(Value::Str(s)) => s,
                _ => String::new(),
            };
            let attrs = match map.remove("attributes") {
                Some(Value::List(items)) => items,
                _ => Vec::new(),
            };
            let children = match map.remove("children") {
                Some(Value::List(items)) => items,
                _ => Vec::new(),
            };
            (name, attrs, children)
        }
        _ => (String::new(), Vec::new(), Vec::new()),
    }
}
