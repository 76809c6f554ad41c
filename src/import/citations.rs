//! Reference-list conversion.
//!
//! JATS encodes references either as structured `<element-citation>` or as
//! loosely structured `<mixed-citation>` elements; both map to citation
//! nodes, differing in how much of the display text is precomputed.

use log::warn;

use crate::graph::{CITATIONS, Node, PropertyPath, Value};
use crate::import::Importer;
use crate::import::dispatch::CitationKind;
use crate::import::state::State;
use crate::xml::{XmlDom, XmlNodeId};

impl Importer {
    /// Convert the reference list, if the document has one.
    pub(crate) fn extract_citations(&self, state: &mut State, dom: &XmlDom) {
        if let Some(ref_list) = dom.find_by_tag(dom.document(), "ref-list") {
            for r in dom.find_all_by_tag(ref_list, "ref") {
                self.reference(state, dom, r);
            }
        }
    }

    fn reference(&self, state: &mut State, dom: &XmlDom, ref_el: XmlNodeId) {
        for child in dom.child_elements(ref_el) {
            let Some(tag) = dom.element_name(child) else {
                continue;
            };
            match self.dispatch.citation_kind(tag) {
                Some(CitationKind::Element) => {
                    self.element_citation(state, dom, ref_el, child);
                }
                Some(CitationKind::Mixed) => {
                    self.mixed_citation(state, dom, ref_el, child);
                }
                None if tag == "label" => {
                    // The label is picked up by the citation handlers.
                }
                None => warn!("element not supported in ref: <{}>", tag),
            }
        }
    }

    /// Convert a structured `<element-citation>`.
    ///
    /// A citation without a person group has no usable structure at all and
    /// produces no node.
    pub(crate) fn element_citation(
        &self,
        state: &mut State,
        dom: &XmlDom,
        ref_el: XmlNodeId,
        citation: XmlNodeId,
    ) -> Option<String> {
        let Some(person_group) = dom.find_by_tag(citation, "person-group") else {
            warn!(
                "element-citation without structure, skipping: {:?}",
                dom.element_id(ref_el)
            );
            return None;
        };

        let id = state.next_id("article_citation");
        let mut node = base_citation_node(&id, dom, ref_el);

        for name_el in dom.find_all_by_tag(person_group, "name") {
            let name = get_name(dom, Some(name_el));
            if !name.is_empty() {
                node.push("authors", name);
            }
        }
        // Collaboration groups count as authors too.
        for collab in dom.find_all_by_tag(person_group, "collab") {
            node.push("authors", dom.text_content(collab));
        }

        self.citation_fields(state, dom, ref_el, citation, &mut node, &id);

        let source_line = format_source_line(&node);
        node.set("source_line", source_line);

        state.doc.create(node);
        state.doc.show(CITATIONS, id.clone());
        Some(id)
    }

    /// Convert a loosely structured `<mixed-citation>`. In addition to the
    /// structured fields, the full free-form text is preserved with its
    /// annotations.
    pub(crate) fn mixed_citation(
        &self,
        state: &mut State,
        dom: &XmlDom,
        ref_el: XmlNodeId,
        citation: XmlNodeId,
    ) -> Option<String> {
        let id = state.next_id("article_citation");
        let mut node = base_citation_node(&id, dom, ref_el);

        for name_el in dom.find_all_by_tag(citation, "string-name") {
            let name = get_name(dom, Some(name_el));
            if !name.is_empty() {
                node.push("authors", name);
            }
        }
        for collab in dom.find_all_by_tag(citation, "collab") {
            node.push("authors", dom.text_content(collab));
        }

        self.citation_fields(state, dom, ref_el, citation, &mut node, &id);

        if let Some(jbjs) = find_with_attr(dom, citation, "pub-id", "pub-id-type", "jbjs") {
            let text = dom.text_content(jbjs);
            node.set("jbjs", text.clone());
            if let Some(url) = dom.get_attr(jbjs, "xlink:href") {
                node.push("citation_urls", url_entry(url, &text));
            }
        }
        if let Some(uri) = find_with_attr(dom, citation, "ext-link", "ext-link-type", "uri") {
            if let Some(url) = dom.get_attr(uri, "xlink:href") {
                node.push("citation_urls", url_entry(url, url));
            }
        }
        if let Some(pmid) = find_with_attr(dom, citation, "pub-id", "pub-id-type", "pmid") {
            node.set("pmid", dom.text_content(pmid));
        }

        let relaxed_text = self.annotated_text(
            state,
            dom,
            citation,
            PropertyPath::new(&id, "relaxed_text"),
            &["pub-id"],
        );
        node.set("relaxed_text", relaxed_text);

        let source_line = format_source_line(&node);
        node.set("source_line", source_line);

        state.doc.create(node);
        state.doc.show(CITATIONS, id.clone());
        Some(id)
    }

    /// Fields shared by both citation encodings.
    fn citation_fields(
        &self,
        state: &mut State,
        dom: &XmlDom,
        ref_el: XmlNodeId,
        citation: XmlNodeId,
        node: &mut Node,
        id: &str,
    ) {
        let source = dom.find_by_tag(citation, "source");
        if let Some(source_el) = source {
            node.set("source", dom.text_content(source_el));
        }

        // Title fallbacks: article-title, then comment, then source.
        if let Some(title_el) = dom.find_by_tag(citation, "article-title") {
            let title =
                self.annotated_text(state, dom, title_el, PropertyPath::new(id, "title"), &[]);
            node.set("article_title", title.clone());
            node.set("title", title);
        } else if let Some(comment) = dom.find_by_tag(citation, "comment") {
            let title =
                self.annotated_text(state, dom, comment, PropertyPath::new(id, "title"), &[]);
            node.set("title", title);
        } else if let Some(source_el) = source {
            let title =
                self.annotated_text(state, dom, source_el, PropertyPath::new(id, "title"), &[]);
            node.set("title", title);
        } else {
            warn!("citation without title: {:?}", dom.element_id(ref_el));
        }

        for (tag, prop) in [
            ("volume", "volume"),
            ("publisher-loc", "publisher_location"),
            ("publisher-name", "publisher_name"),
            ("fpage", "fpage"),
            ("lpage", "lpage"),
            ("year", "year"),
        ] {
            if let Some(el) = dom.find_by_tag(citation, tag) {
                node.set(prop, dom.text_content(el));
            }
        }

        // The label lives on the enclosing ref element.
        if let Some(label) = dom.find_by_tag(ref_el, "label") {
            node.set("label", dom.text_content(label));
        }

        let doi = find_with_attr(dom, citation, "pub-id", "pub-id-type", "doi")
            .or_else(|| find_with_attr(dom, citation, "ext-link", "ext-link-type", "doi"));
        if let Some(doi) = doi {
            node.set("doi", format!("http://dx.doi.org/{}", dom.text_content(doi)));
        }

        // Relaxed date: whatever of year/month/day is present, space-joined.
        if let Some(year) = node.get_str("year").map(|y| y.to_string()) {
            let mut relaxed = year;
            if let Some(month) = dom.find_by_tag(citation, "month") {
                relaxed.push(' ');
                relaxed.push_str(&dom.text_content(month));
            }
            if let Some(day) = dom.find_by_tag(citation, "day") {
                relaxed.push(' ');
                relaxed.push_str(&dom.text_content(day));
            }
            node.set("relaxed_date", relaxed);
        }
    }
}

fn base_citation_node(id: &str, dom: &XmlDom, ref_el: XmlNodeId) -> Node {
    let mut node = Node::new(id, "citation")
        .with("title", "N/A")
        .with("article_title", "N/A")
        .with("label", "")
        .with("authors", Vec::<Value>::new())
        .with("doi", "")
        .with("source", "")
        .with("volume", "")
        .with("fpage", "")
        .with("lpage", "")
        .with("citation_urls", Vec::<Value>::new())
        .with("referenced", is_referenced(dom, dom.element_id(ref_el)));
    if let Some(sid) = dom.element_id(ref_el) {
        node.set("source_id", sid);
    }
    node
}

/// Build the human-displayable source line: source/volume, page range, and
/// publisher/date fragments joined with separators only between parts that
/// are actually present.
pub(crate) fn format_source_line(node: &Node) -> String {
    let get = |key: &str| node.get_str(key).unwrap_or("");

    let source = get("source");
    let volume = get("volume");
    let source_frag = if !source.is_empty() && volume.is_empty() {
        source.to_string()
    } else if !source.is_empty() {
        format!("{}, {}", source, volume)
    } else {
        String::new()
    };

    let fpage = get("fpage");
    let lpage = get("lpage");
    let pages_frag = if !fpage.is_empty() && !lpage.is_empty() {
        format!("{}-{}", fpage, lpage)
    } else {
        String::new()
    };

    let mut publisher_parts: Vec<&str> = Vec::new();
    let publisher_name = get("publisher_name");
    let publisher_location = get("publisher_location");
    if !publisher_name.is_empty() && !publisher_location.is_empty() {
        publisher_parts.push(publisher_name);
        publisher_parts.push(publisher_location);
    }
    let relaxed_date = get("relaxed_date");
    let year = get("year");
    if !relaxed_date.is_empty() {
        publisher_parts.push(relaxed_date);
    } else if !year.is_empty() {
        publisher_parts.push(year);
    }
    let publisher_frag = publisher_parts.join(", ");

    let mut out = source_frag;
    if !out.is_empty() && (!pages_frag.is_empty() || !publisher_frag.is_empty()) {
        out.push_str(": ");
    }
    if !pages_frag.is_empty() && !publisher_frag.is_empty() {
        out.push_str(&publisher_frag);
        out.push_str(", ");
        out.push_str(&pages_frag);
    } else {
        out.push_str(&pages_frag);
        out.push_str(&publisher_frag);
    }
    out
}

/// Join the name fragments of a `<name>` or `<string-name>` element:
/// given names and surname, with optional prefix and suffix.
pub(crate) fn get_name(dom: &XmlDom, name_el: Option<XmlNodeId>) -> String {
    let Some(name_el) = name_el else {
        return "N/A".to_string();
    };

    let mut parts: Vec<String> = Vec::new();
    if let Some(given) = dom.find_by_tag(name_el, "given-names") {
        parts.push(dom.text_content(given).trim().to_string());
    }
    if let Some(surname) = dom.find_by_tag(name_el, "surname") {
        parts.push(dom.text_content(surname).trim().to_string());
    }
    let mut name = parts.join(" ");
    if name.is_empty() {
        return name;
    }

    if let Some(prefix) = dom.find_by_tag(name_el, "prefix") {
        let prefix = dom.text_content(prefix).trim().to_string();
        if !prefix.is_empty() {
            name = format!("{} {}", prefix, name);
        }
    }
    if let Some(suffix) = dom.find_by_tag(name_el, "suffix") {
        let suffix = dom.text_content(suffix).trim().to_string();
        if !suffix.is_empty() {
            name = format!("{}, {}", name, suffix);
        }
    }
    name
}

/// First descendant with a tag name and a specific attribute value.
pub(crate) fn find_with_attr(
    dom: &XmlDom,
    root: XmlNodeId,
    tag: &str,
    attr: &str,
    value: &str,
) -> Option<XmlNodeId> {
    dom.find(root, |el| {
        dom.element_name(el) == Some(tag) && dom.get_attr(el, attr) == Some(value)
    })
}

/// Whether any cross-reference in the document points at this source id.
pub(crate) fn is_referenced(dom: &XmlDom, source_id: Option<&str>) -> bool {
    let Some(source_id) = source_id else {
        return false;
    };
    dom.descendants(dom.document()).any(|el| {
        dom.element_name(el) == Some("xref") && dom.get_attr(el, "rid") == Some(source_id)
    })
}

fn url_entry(url: &str, name: &str) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("url".to_string(), Value::Str(url.to_string()));
    map.insert("name".to_string(), Value::Str(name.to_string()));
    Value::Map(map)
}
