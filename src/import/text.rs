//! Annotated-text extraction.
//!
//! Turns a mixed-content subtree (text interleaved with inline markup) into a
//! normalized plain string plus annotation and inline-node stubs with
//! character ranges over that string. Nested annotations recurse through the
//! same routine; unknown elements either end the current text block (at the
//! top level of a paragraph) or are skipped with a diagnostic (when nested).

use log::{debug, warn};

use crate::graph::{Annotation, PropertyPath};
use crate::import::dispatch::{AnnotationKind, InlineKind};
use crate::import::state::{Frame, State};
use crate::import::Importer;
use crate::xml::{XmlDom, XmlNodeId};

const LINK_MAX_LENGTH: usize = 50;
const LINK_MARGIN: usize = 10;

/// Forward iterator over a node's children with one-step pushback, so a
/// caller can hand an element back for reprocessing as a sibling block.
pub struct ChildCursor {
    children: Vec<XmlNodeId>,
    pos: usize,
}

impl ChildCursor {
    pub fn new(dom: &XmlDom, el: XmlNodeId) -> Self {
        Self {
            children: dom.children(el).collect(),
            pos: 0,
        }
    }

    pub fn from_children(children: Vec<XmlNodeId>) -> Self {
        Self { children, pos: 0 }
    }

    pub fn next(&mut self) -> Option<XmlNodeId> {
        let id = self.children.get(self.pos).copied()?;
        self.pos += 1;
        Some(id)
    }

    pub fn back(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }
}

/// Options threaded through one extraction descent.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Character offset to start counting from (nonzero when resuming after
    /// a nested call).
    pub offset: usize,
    /// Whether this call is inside an annotation element.
    pub nested: bool,
    /// Whether an unknown element ends the current text block instead of
    /// contributing its text.
    pub break_on_unknown: bool,
    /// Ambient list context for text-rendered lists (e.g. inside table
    /// cells or free-form citations).
    pub list_type: Option<String>,
    pub list_order: Option<usize>,
}

impl Importer {
    /// Extract the annotated text of an element's content.
    ///
    /// Annotation stubs are queued against `path`; `ignore` suppresses the
    /// named child tags entirely.
    pub(crate) fn annotated_text(
        &self,
        state: &mut State,
        dom: &XmlDom,
        el: XmlNodeId,
        path: PropertyPath,
        ignore: &[&str],
    ) -> String {
        state.reset_whitespace();
        state.push_frame(Frame {
            path,
            ignore: ignore.iter().map(|s| s.to_string()).collect(),
        });
        let mut cursor = ChildCursor::new(dom, el);
        let text = self.annotated_text_inner(state, dom, &mut cursor, ExtractOptions::default());
        state.pop_frame();
        text
    }

    /// The recursive worker. The cursor may be shared with the caller (the
    /// paragraph assembler resumes it after a block boundary).
    pub(crate) fn annotated_text_inner(
        &self,
        state: &mut State,
        dom: &XmlDom,
        cursor: &mut ChildCursor,
        options: ExtractOptions,
    ) -> String {
        let mut plain = String::new();
        let mut char_pos = options.offset;
        let mut options = options;

        while let Some(el) = cursor.next() {
            // Plain text nodes...
            if let Some(raw) = dom.text(el) {
                let text = state.accept_text(raw);
                char_pos += text.chars().count();
                plain.push_str(&text);
                continue;
            }
            let Some(tag) = dom.element_name(el) else {
                // Comments carry no content.
                continue;
            };
            let tag = tag.to_string();

            // Annotations...
            if let Some(kind) = self.dispatch.annotation_kind(&tag) {
                if state.is_ignored(&tag) {
                    continue;
                }
                let start = char_pos;
                let text = self.annotation_body_text(state, dom, el, kind, char_pos, &options);
                char_pos += text.chars().count();
                plain.push_str(&text);
                self.create_annotation(state, dom, el, &tag, kind, start, char_pos);
            }
            // Inline nodes...
            else if let Some(kind) = self.dispatch.inline_kind(&tag) {
                self.create_inline_node(state, dom, el, kind, char_pos);
                plain.push(' ');
                char_pos += 1;
            }
            // Unsupported...
            else if options.break_on_unknown {
                if options.nested {
                    warn!("element not supported in annotated text: <{}>", tag);
                } else {
                    // On paragraph level other elements break the text block;
                    // shift back so the caller reprocesses it as a sibling.
                    cursor.back();
                    break;
                }
            } else if !state.is_ignored(&tag) {
                // Irregular content (table cells, free-form citations) keeps
                // the text of unknown elements, rendering nested lists with
                // textual bullets and numbering.
                if tag == "list" {
                    if let Some(list_type) = dom.get_attr(el, "list-type") {
                        options.list_type = Some(list_type.to_string());
                        if list_type == "order" {
                            options.list_order = Some(1);
                        }
                    }
                }

                let mut prefix = String::new();
                if tag == "list-item" {
                    let with_label = dom.direct_child(el, "label").is_some();
                    match options.list_type.as_deref() {
                        Some("bullet") if !with_label => prefix.push('\u{2022}'),
                        Some("order") => {
                            if let Some(order) = options.list_order {
                                if !with_label {
                                    prefix.push_str(&format!("{}.", order));
                                }
                                options.list_order = Some(order + 1);
                            }
                        }
                        _ => {}
                    }
                }
                if !prefix.is_empty() {
                    prefix.push(' ');
                    char_pos += prefix.chars().count();
                    plain.push_str(&prefix);
                }

                let text = self.annotation_text(state, dom, el, char_pos, &options);
                char_pos += text.chars().count();
                plain.push_str(&text);

                let mut suffix = String::new();
                if tag == "list-item" {
                    suffix.push_str("<br>");
                }
                let parent = dom.get(el).map(|n| n.parent);
                if tag == "label"
                    && parent.is_some_and(|p| dom.element_name(p) == Some("list-item"))
                {
                    suffix.push(' ');
                }
                if !suffix.is_empty() {
                    char_pos += suffix.chars().count();
                    plain.push_str(&suffix);
                }
            }
        }
        plain
    }

    /// Text content of one annotation element, honoring per-kind overrides.
    fn annotation_body_text(
        &self,
        state: &mut State,
        dom: &XmlDom,
        el: XmlNodeId,
        kind: AnnotationKind,
        char_pos: usize,
        options: &ExtractOptions,
    ) -> String {
        match kind {
            AnnotationKind::Link => {
                let text = self.annotation_text(state, dom, el, char_pos, options);
                // Shorten the label of a raw URL link; labels that differ
                // from the href are left alone.
                let href = dom.get_attr(el, "xlink:href").unwrap_or("");
                if !href.is_empty() && href == text.trim() {
                    shorten_link_label(&text)
                } else {
                    text
                }
            }
            // Inline formulas render as a fixed placeholder token; the
            // actual formula becomes a separate node targeted by the
            // annotation.
            AnnotationKind::InlineFormula => state.accept_text("{{inline-formula}}"),
            // Grouped person names render as space-joined child text.
            AnnotationKind::StringName => {
                let mut out = String::new();
                for child in dom.children(el) {
                    out.push(' ');
                    out.push_str(&dom.text_content(child));
                }
                out
            }
            AnnotationKind::Break => " ".to_string(),
            _ => self.annotation_text(state, dom, el, char_pos, options),
        }
    }

    /// Default recursion into an annotation element: collect nested
    /// annotations and the contained plain text.
    fn annotation_text(
        &self,
        state: &mut State,
        dom: &XmlDom,
        el: XmlNodeId,
        char_pos: usize,
        options: &ExtractOptions,
    ) -> String {
        let mut cursor = ChildCursor::new(dom, el);
        let nested = ExtractOptions {
            offset: char_pos,
            nested: true,
            ..options.clone()
        };
        self.annotated_text_inner(state, dom, &mut cursor, nested)
    }

    /// Queue an annotation stub over `[start, end)` at the current path.
    pub(crate) fn create_annotation(
        &self,
        state: &mut State,
        dom: &XmlDom,
        el: XmlNodeId,
        tag: &str,
        kind: AnnotationKind,
        start: usize,
        end: usize,
    ) {
        // Empty markup with no visible text would make a meaningless styling
        // annotation; pure navigational markers keep their target though.
        if kind != AnnotationKind::Xref && start == end {
            return;
        }

        let kind_str = match kind {
            AnnotationKind::Xref => self.dispatch.ref_kind(dom.get_attr(el, "ref-type")),
            _ => kind.kind_str(),
        };
        let mut anno = Annotation::new(kind_str, state.top().path, (start, end));

        match kind {
            AnnotationKind::Xref => {
                if let Some(rid) = dom.get_attr(el, "rid") {
                    anno.target = Some(rid.to_string());
                }
            }
            AnnotationKind::Link => {
                let url = dom.get_attr(el, "xlink:href").unwrap_or("").to_string();
                let ext_link_type = dom
                    .get_attr(el, "ext-link-type")
                    .unwrap_or("")
                    .to_ascii_lowercase();
                // Add 'http://' to URIs without a protocol, such as
                // 'www.google.com'; URLs starting with a slash are relative.
                let url = if (tag == "uri" || ext_link_type == "uri")
                    && !has_url_scheme(&url)
                    && !url.starts_with('/')
                {
                    format!("http://{}", url)
                } else if ext_link_type == "doi" {
                    format!("http://dx.doi.org/{}", url)
                } else {
                    url
                };
                anno.set("url", url);
            }
            AnnotationKind::Email => {
                anno.set("url", format!("mailto:{}", dom.text_content(el).trim()));
            }
            AnnotationKind::InlineFormula => {
                let formula_id = self.formula(state, dom, el, true);
                anno.target = Some(formula_id);
            }
            AnnotationKind::Custom => {
                anno.set("name", tag);
            }
            _ => {}
        }

        self.hooks.annotation(&mut anno, dom, el);

        // Assign the id after the kind is final, so ids stay typed.
        anno.id = state.next_id(&anno.kind);
        state.annotations.push(anno);
    }

    /// Queue an inline-node stub at a single character position.
    pub(crate) fn create_inline_node(
        &self,
        state: &mut State,
        dom: &XmlDom,
        el: XmlNodeId,
        kind: InlineKind,
        char_pos: usize,
    ) {
        match kind {
            InlineKind::Footnote => {
                // The referenced footnote is created right away so it exists
                // before reference resolution runs.
                let footnote_id = self.footnote(state, dom, el, None);
                let mut anno = Annotation::new(
                    "footnote_reference",
                    state.top().path,
                    (char_pos, char_pos + 1),
                );
                anno.target = Some(footnote_id);
                anno.set("generated", true);
                anno.id = state.next_id("footnote_reference");
                state.annotations.push(anno);
            }
        }
    }
}

fn has_url_scheme(url: &str) -> bool {
    url.find("://")
        .is_some_and(|i| i > 0 && url[..i].chars().all(|c| c.is_alphanumeric() || c == '_'))
}

/// Shorten an overlong link label, preferring to elide the fragment after
/// the host part while keeping the tail visible.
pub(crate) fn shorten_link_label(label: &str) -> String {
    let chars: Vec<char> = label.chars().collect();
    if chars.len() <= LINK_MAX_LENGTH {
        return label.to_string();
    }

    let take = |range: &[char]| range.iter().collect::<String>();

    match split_host_tail(&chars) {
        Some((host, tail)) => {
            if host.len() > LINK_MAX_LENGTH - LINK_MARGIN {
                let keep_tail = (LINK_MARGIN + 3).min(tail.len());
                format!(
                    "{}...{}",
                    take(&host[..LINK_MAX_LENGTH - LINK_MARGIN]),
                    take(&tail[tail.len() - keep_tail..])
                )
            } else {
                let margin = (LINK_MAX_LENGTH - host.len()).saturating_sub(3).max(LINK_MARGIN - 3);
                let keep_tail = margin.min(tail.len());
                format!(
                    "{}...{}",
                    take(&host),
                    take(&tail[tail.len() - keep_tail..])
                )
            }
        }
        None => {
            debug!("link label has no host part, truncating: {}", label);
            let keep_tail = (LINK_MARGIN + 3).min(chars.len());
            format!(
                "{}...{}",
                take(&chars[..LINK_MAX_LENGTH - LINK_MARGIN]),
                take(&chars[chars.len() - keep_tail..])
            )
        }
    }
}

/// Split a URL-ish label into (host part, tail). The host part spans an
/// optional scheme, an optional leading slash, and the first path segment
/// with its trailing slash.
fn split_host_tail(chars: &[char]) -> Option<(Vec<char>, Vec<char>)> {
    let s: String = chars.iter().collect();
    let mut idx = 0;

    if let Some(pos) = s.find("://") {
        if s[..pos].chars().all(|c| c.is_alphanumeric() || c == '_') {
            idx = s[..pos].chars().count() + 3;
        }
    }
    if chars.get(idx) == Some(&'/') {
        idx += 1;
    }
    let host_start = idx;
    while idx < chars.len() && chars[idx] != '/' {
        idx += 1;
    }
    if idx == host_start {
        return None;
    }
    if chars.get(idx) == Some(&'/') {
        idx += 1;
    }
    Some((chars[..idx].to_vec(), chars[idx..].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_pushback() {
        let mut cursor = ChildCursor::from_children(vec![XmlNodeId(1), XmlNodeId(2)]);
        assert_eq!(cursor.next(), Some(XmlNodeId(1)));
        cursor.back();
        assert_eq!(cursor.next(), Some(XmlNodeId(1)));
        assert_eq!(cursor.next(), Some(XmlNodeId(2)));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn test_shorten_short_label_unchanged() {
        assert_eq!(shorten_link_label("https://example.com"), "https://example.com");
    }

    #[test]
    fn test_shorten_preserves_host_and_tail() {
        let label = "https://example.com/a/very/long/path/segment/that/keeps/going/forever";
        let short = shorten_link_label(label);
        assert!(short.chars().count() < label.chars().count());
        assert!(short.starts_with("https://example.com/"));
        assert!(short.contains("..."));
        assert!(short.ends_with("forever"));
    }

    #[test]
    fn test_shorten_long_host() {
        let label = format!("https://{}.example.com/x", "a".repeat(60));
        let short = shorten_link_label(&label);
        assert!(short.contains("..."));
        assert!(short.starts_with("https://aaa"));
    }

    #[test]
    fn test_has_url_scheme() {
        assert!(has_url_scheme("http://example.com"));
        assert!(has_url_scheme("ftp://example.com"));
        assert!(!has_url_scheme("www.example.com"));
        assert!(!has_url_scheme("://example.com"));
    }
}
