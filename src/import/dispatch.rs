//! Element classification tables.
//!
//! Three disjoint classifications drive the recursive descent: block-level
//! handlers, inline annotations, and inline nodes. The tables are built once
//! per importer and can be overridden for venue-specific tag sets.

use std::collections::{HashMap, HashSet};

/// Block-level element handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Section,
    List,
    Formula,
    Caption,
    BoxedText,
    Quote,
    Attrib,
    Comment,
    Figure,
    FigureGroup,
}

/// Inline annotation classification.
///
/// `kind_str` yields the semantic annotation type committed to the graph;
/// `Xref` is resolved further through the ref-type table, and `Generic`
/// covers grouping tags that annotate without specific semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Strong,
    Emphasis,
    Code,
    Subscript,
    Superscript,
    Underline,
    Custom,
    Link,
    Email,
    Xref,
    InlineFormula,
    Break,
    StringName,
    Generic,
}

impl AnnotationKind {
    /// The semantic annotation type string for the graph.
    pub fn kind_str(&self) -> &'static str {
        match self {
            AnnotationKind::Strong => "strong",
            AnnotationKind::Emphasis => "emphasis",
            AnnotationKind::Code => "code",
            AnnotationKind::Subscript => "subscript",
            AnnotationKind::Superscript => "superscript",
            AnnotationKind::Underline => "underline",
            AnnotationKind::Custom => "custom_annotation",
            AnnotationKind::Link | AnnotationKind::Email => "link",
            AnnotationKind::InlineFormula => "inline-formula",
            AnnotationKind::Break => "break",
            // Resolved via the ref-type table before commit.
            AnnotationKind::Xref => "cross_reference",
            AnnotationKind::StringName | AnnotationKind::Generic => "annotation",
        }
    }
}

/// Inline-node classification: elements that become a distinct referencable
/// node at a single text offset instead of wrapping a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InlineKind {
    Footnote,
}

/// Citation encoding styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationKind {
    Element,
    Mixed,
}

/// The three classification tables plus the secondary lookups they feed.
#[derive(Debug, Clone)]
pub struct Dispatch {
    blocks: HashMap<String, BlockKind>,
    annotations: HashMap<String, AnnotationKind>,
    inline_nodes: HashMap<String, InlineKind>,
    /// xref ref-type attribute -> annotation kind string.
    ref_types: HashMap<String, &'static str>,
    /// Block-level tags processed by a dedicated whole-document sweep.
    deferred_blocks: HashSet<String>,
    /// Paragraph children dropped during segmentation.
    ignored_paragraph: HashSet<String>,
    /// Paragraph children pulled out as sibling blocks during segmentation.
    embedded_paragraph: HashMap<String, BlockKind>,
    citations: HashMap<String, CitationKind>,
    list_types: HashMap<String, &'static str>,
    contrib_types: HashMap<String, &'static str>,
}

impl Default for Dispatch {
    fn default() -> Self {
        let mut blocks = HashMap::new();
        for (tag, kind) in [
            ("p", BlockKind::Paragraph),
            ("sec", BlockKind::Section),
            ("list", BlockKind::List),
            ("disp-formula", BlockKind::Formula),
            ("caption", BlockKind::Caption),
            ("boxed-text", BlockKind::BoxedText),
            ("disp-quote", BlockKind::Quote),
            ("attrib", BlockKind::Attrib),
            ("comment", BlockKind::Comment),
            ("fig", BlockKind::Figure),
            ("fig-group", BlockKind::FigureGroup),
        ] {
            blocks.insert(tag.to_string(), kind);
        }

        let mut annotations = HashMap::new();
        for (tag, kind) in [
            ("bold", AnnotationKind::Strong),
            ("italic", AnnotationKind::Emphasis),
            ("monospace", AnnotationKind::Code),
            ("sub", AnnotationKind::Subscript),
            ("sup", AnnotationKind::Superscript),
            ("sc", AnnotationKind::Custom),
            ("roman", AnnotationKind::Custom),
            ("sans-serif", AnnotationKind::Custom),
            ("styled-content", AnnotationKind::Custom),
            ("underline", AnnotationKind::Underline),
            ("ext-link", AnnotationKind::Link),
            ("uri", AnnotationKind::Link),
            ("email", AnnotationKind::Email),
            ("xref", AnnotationKind::Xref),
            ("named-content", AnnotationKind::Generic),
            ("inline-formula", AnnotationKind::InlineFormula),
            ("article-title", AnnotationKind::Strong),
            ("source", AnnotationKind::Emphasis),
            ("string-name", AnnotationKind::StringName),
            ("break", AnnotationKind::Break),
        ] {
            annotations.insert(tag.to_string(), kind);
        }

        let mut inline_nodes = HashMap::new();
        inline_nodes.insert("fn".to_string(), InlineKind::Footnote);

        let mut ref_types = HashMap::new();
        for (ref_type, kind) in [
            ("bibr", "citation_reference"),
            ("fig", "figure_reference"),
            ("table", "figure_reference"),
            ("supplementary-material", "figure_reference"),
            ("other", "figure_reference"),
            ("list", "definition_reference"),
            ("fn", "footnote_reference"),
            ("table-fn", "footnote_reference"),
            ("aff", "affiliation_reference"),
        ] {
            ref_types.insert(ref_type.to_string(), kind);
        }

        // Figures, tables, supplements, videos, and footnotes are extracted
        // in dedicated whole-document sweeps after the body walk, to
        // tolerate forward and out-of-order references.
        let deferred_blocks: HashSet<String> =
            ["table-wrap", "supplementary-material", "media", "fn"]
                .into_iter()
                .map(String::from)
                .collect();

        let ignored_paragraph: HashSet<String> = [
            "comment",
            "supplementary-material",
            "fig",
            "fig-group",
            "table-wrap",
            "media",
            "inline-graphic",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let mut embedded_paragraph = HashMap::new();
        for (tag, kind) in [
            ("boxed-text", BlockKind::BoxedText),
            ("disp-quote", BlockKind::Quote),
            ("list", BlockKind::List),
            ("disp-formula", BlockKind::Formula),
        ] {
            embedded_paragraph.insert(tag.to_string(), kind);
        }

        let mut citations = HashMap::new();
        citations.insert("element-citation".to_string(), CitationKind::Element);
        citations.insert("mixed-citation".to_string(), CitationKind::Mixed);

        let mut list_types = HashMap::new();
        for (source, rendered) in [
            ("bullet", "bulleted"),
            ("ordered", "ordered"),
            ("order", "ordered"),
            ("simple", "simple"),
        ] {
            list_types.insert(source.to_string(), rendered);
        }

        let mut contrib_types = HashMap::new();
        for (source, label) in [
            ("author", "Author"),
            ("author non-byline", "Author"),
            ("autahor", "Author"),
            ("auther", "Author"),
            ("editor", "Editor"),
            ("guest-editor", "Guest Editor"),
            ("group-author", "Group Author"),
            ("collab", "Collaborator"),
            ("reviewed-by", "Reviewer"),
            ("nominated-by", "Nominator"),
            ("corresp", "Corresponding Author"),
            ("other", "Other"),
            ("assoc-editor", "Associate Editor"),
            ("associate editor", "Associate Editor"),
            ("series-editor", "Series Editor"),
            ("contributor", "Contributor"),
            ("chairman", "Chairman"),
            ("monographs-editor", "Monographs Editor"),
            ("contrib-author", "Contributing Author"),
            ("organizer", "Organizer"),
            ("chair", "Chair"),
            ("discussant", "Discussant"),
            ("presenter", "Presenter"),
            ("guest-issue-editor", "Guest Issue Editor"),
            ("participant", "Participant"),
            ("translator", "Translator"),
        ] {
            contrib_types.insert(source.to_string(), label);
        }

        Self {
            blocks,
            annotations,
            inline_nodes,
            ref_types,
            deferred_blocks,
            ignored_paragraph,
            embedded_paragraph,
            citations,
            list_types,
            contrib_types,
        }
    }
}

impl Dispatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_kind(&self, tag: &str) -> Option<BlockKind> {
        self.blocks.get(tag).copied()
    }

    pub fn annotation_kind(&self, tag: &str) -> Option<AnnotationKind> {
        self.annotations.get(tag).copied()
    }

    pub fn is_annotation(&self, tag: &str) -> bool {
        self.annotations.contains_key(tag)
    }

    pub fn inline_kind(&self, tag: &str) -> Option<InlineKind> {
        self.inline_nodes.get(tag).copied()
    }

    pub fn is_inline_node(&self, tag: &str) -> bool {
        self.inline_nodes.contains_key(tag)
    }

    /// Resolve an xref ref-type attribute to an annotation kind string.
    /// Anything unknown is a plain cross reference.
    pub fn ref_kind(&self, ref_type: Option<&str>) -> &'static str {
        ref_type
            .and_then(|rt| self.ref_types.get(rt).copied())
            .unwrap_or("cross_reference")
    }

    pub fn is_deferred_block(&self, tag: &str) -> bool {
        self.deferred_blocks.contains(tag)
    }

    pub fn is_ignored_paragraph_child(&self, tag: &str) -> bool {
        self.ignored_paragraph.contains(tag)
    }

    pub fn embedded_block_kind(&self, tag: &str) -> Option<BlockKind> {
        self.embedded_paragraph.get(tag).copied()
    }

    pub fn citation_kind(&self, tag: &str) -> Option<CitationKind> {
        self.citations.get(tag).copied()
    }

    /// Map a source list-type attribute to a rendering category.
    pub fn list_type(&self, source: Option<&str>) -> &'static str {
        source
            .and_then(|s| self.list_types.get(s).copied())
            .unwrap_or("simple")
    }

    /// Human readable contributor type, when the contrib-type is known.
    pub fn contrib_type(&self, source: &str) -> Option<&'static str> {
        self.contrib_types.get(source).copied()
    }

    // Override points for specialized converters.

    /// Register or replace a block classification.
    pub fn set_block(&mut self, tag: &str, kind: BlockKind) {
        self.blocks.insert(tag.to_string(), kind);
    }

    /// Register or replace an annotation classification.
    pub fn set_annotation(&mut self, tag: &str, kind: AnnotationKind) {
        self.annotations.insert(tag.to_string(), kind);
    }

    /// Remove a tag from the annotation table.
    pub fn remove_annotation(&mut self, tag: &str) {
        self.annotations.remove(tag);
    }

    /// Register or replace an xref ref-type mapping.
    pub fn set_ref_type(&mut self, ref_type: &str, kind: &'static str) {
        self.ref_types.insert(ref_type.to_string(), kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_classification() {
        let dispatch = Dispatch::new();
        assert_eq!(dispatch.annotation_kind("bold"), Some(AnnotationKind::Strong));
        assert_eq!(AnnotationKind::Strong.kind_str(), "strong");
        assert!(!dispatch.is_annotation("graphic"));
    }

    #[test]
    fn test_ref_type_fallback() {
        let dispatch = Dispatch::new();
        assert_eq!(dispatch.ref_kind(Some("bibr")), "citation_reference");
        assert_eq!(dispatch.ref_kind(Some("aff")), "affiliation_reference");
        assert_eq!(dispatch.ref_kind(Some("sec")), "cross_reference");
        assert_eq!(dispatch.ref_kind(None), "cross_reference");
    }

    #[test]
    fn test_list_type_defaulting() {
        let dispatch = Dispatch::new();
        assert_eq!(dispatch.list_type(Some("bullet")), "bulleted");
        assert_eq!(dispatch.list_type(Some("order")), "ordered");
        assert_eq!(dispatch.list_type(Some("fancy")), "simple");
        assert_eq!(dispatch.list_type(None), "simple");
    }

    #[test]
    fn test_overrides() {
        let mut dispatch = Dispatch::new();
        dispatch.remove_annotation("underline");
        assert!(!dispatch.is_annotation("underline"));
        dispatch.set_ref_type("video", "figure_reference");
        assert_eq!(dispatch.ref_kind(Some("video")), "figure_reference");
    }
}
