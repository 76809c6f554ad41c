//! Footnote conversion.
//!
//! Footnotes are created on demand: during the catch-all sweep over `<fn>`
//! elements, eagerly when an inline footnote marker needs a target, or when
//! a contributor's author-note cross-reference requires one. The consumed
//! set keeps all three paths from creating duplicates.

use crate::graph::{Annotation, Node, PropertyPath};
use crate::import::Importer;
use crate::import::blocks::string_list;
use crate::import::state::State;
use crate::xml::{XmlDom, XmlNodeId};

impl Importer {
    /// Convert a `<fn>` element into a footnote node, returning its id.
    pub(crate) fn footnote(
        &self,
        state: &mut State,
        dom: &XmlDom,
        fn_el: XmlNodeId,
        tag: Option<&str>,
    ) -> String {
        let footnote_id = state.next_id("footnote");
        let reference_id = state.next_id("footnote_reference");
        let source_id = dom.element_id(fn_el).map(|s| s.to_string());

        let children: Vec<_> = dom.child_elements(fn_el).collect();
        let mut body_start = 0;

        // The first child may be a label; otherwise try the reverse lookup
        // of cross-references pointing here from elsewhere in the document.
        let mut label = String::new();
        if children
            .first()
            .is_some_and(|&c| dom.element_name(c) == Some("label"))
        {
            label = self.annotated_text(
                state,
                dom,
                children[0],
                PropertyPath::new(&footnote_id, "label"),
                &[],
            );
            body_start = 1;
        } else if let Some(sid) = &source_id {
            if let Some(xref) = find_xref_to(dom, "table-fn", sid) {
                label = dom.text_content(xref);
            }
        }

        let mut body: Vec<String> = Vec::new();
        for &child in &children[body_start..] {
            body.extend(self.paragraph_group(state, dom, child));
        }

        let mut node = Node::new(&footnote_id, "footnote")
            .with("label", label)
            .with("children", string_list(&body))
            .with("tag", tag.unwrap_or(""))
            .with("reference_id", reference_id);
        if let Some(sid) = &source_id {
            node.set("source_id", sid.as_str());
        }
        state.doc.create(node);

        // Leave a trace for the catch-all sweep.
        state.consume(fn_el);
        footnote_id
    }

    /// Catch-all sweep over footnotes that have not been converted yet.
    pub(crate) fn extract_footnotes(&self, state: &mut State, dom: &XmlDom, article: XmlNodeId) {
        for fn_el in dom.find_all_by_tag(article, "fn") {
            if state.is_consumed(fn_el) {
                continue;
            }
            self.footnote(state, dom, fn_el, None);
        }
        self.make_note_references(state);
    }

    /// Author and subtitle notes need a label-spanning reference annotation
    /// so readers can navigate to them; materialize any that are missing.
    fn make_note_references(&self, state: &mut State) {
        let note_ids: Vec<String> = state
            .author_note_ids
            .iter()
            .chain(state.subtitle_note_ids.iter())
            .cloned()
            .collect();

        for source_id in note_ids {
            let Some(footnote) = state.doc.node_by_source_id(&source_id) else {
                continue;
            };
            let label = footnote.get_str("label").unwrap_or("");
            if label.is_empty() {
                continue;
            }
            let footnote_id = footnote.id.clone();
            let label_len = label.chars().count();
            let Some(reference_id) = footnote.get_str("reference_id").map(|s| s.to_string())
            else {
                continue;
            };

            let already_exists = state.annotations.iter().any(|a| a.id == reference_id)
                || state.doc.annotations().iter().any(|a| a.id == reference_id);
            if already_exists {
                continue;
            }

            let mut anno = Annotation::new(
                "footnote_reference",
                PropertyPath::new(&footnote_id, "label"),
                (0, label_len),
            );
            anno.target = Some(footnote_id);
            anno.id = reference_id;
            state.annotations.push(anno);
        }
    }
}

/// Find an `<xref>` with the given ref-type pointing at a source id.
fn find_xref_to(dom: &XmlDom, ref_type: &str, rid: &str) -> Option<XmlNodeId> {
    dom.find(dom.document(), |el| {
        dom.element_name(el) == Some("xref")
            && dom.get_attr(el, "ref-type") == Some(ref_type)
            && dom.get_attr(el, "rid") == Some(rid)
    })
}

/// Find a `<sup>` inside an `<xref ref-type="aff">` pointing at a source id;
/// affiliations without labels borrow the superscript of their reference.
pub(crate) fn find_aff_label(dom: &XmlDom, rid: &str) -> Option<String> {
    let xref = dom.find(dom.document(), |el| {
        dom.element_name(el) == Some("xref")
            && dom.get_attr(el, "ref-type") == Some("aff")
            && dom.get_attr(el, "rid") == Some(rid)
    })?;
    let sup = dom.find_by_tag(xref, "sup")?;
    Some(dom.text_content(sup))
}
