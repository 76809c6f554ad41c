//! Article import: a single-pass recursive descent over the source XML that
//! builds the document graph, followed by a reference-resolution pass over
//! the queued annotations.

mod blocks;
mod citations;
mod dispatch;
mod figures;
mod footnotes;
mod front;
mod resolve;
mod state;
mod text;

pub use dispatch::{AnnotationKind, BlockKind, CitationKind, Dispatch, InlineKind};

use crate::error::Result;
use crate::graph::{Annotation, DocumentGraph, Node};
use crate::xml::{XmlDom, XmlNodeId, parse_xml};

use state::State;

/// Options controlling one importer instance.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Normalize whitespace in text content. Disable only for documents
    /// whose whitespace is already significant.
    pub trim_whitespace: bool,
    /// Collapse whitespace runs inside text, not just at element edges.
    pub remove_inner_ws: bool,
    /// Base URL for resolving relative media references, used when the
    /// article carries no `xml:base` attribute.
    pub base_url: Option<String>,
    /// Custom-meta fields to drop entirely.
    pub ignore_custom_meta_names: Vec<String>,
    /// Custom-meta fields rendered without their heading.
    pub ignore_custom_meta_header_names: Vec<String>,
    /// Skip the custom-meta group altogether.
    pub ignore_all_custom_meta: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            trim_whitespace: true,
            remove_inner_ws: true,
            base_url: None,
            ignore_custom_meta_names: Vec::new(),
            ignore_custom_meta_header_names: Vec::new(),
            ignore_all_custom_meta: false,
        }
    }
}

/// Venue enrichment callbacks, invoked after a node of the given type is
/// built and before it is committed. Implementations may mutate the node in
/// place; the defaults do nothing.
#[allow(unused_variables)]
pub trait Enhance {
    fn article(&self, doc: &mut DocumentGraph, dom: &XmlDom, article: XmlNodeId) {}
    fn cover(&self, node: &mut Node, dom: &XmlDom, el: XmlNodeId) {}
    fn figure(&self, node: &mut Node, dom: &XmlDom, el: XmlNodeId) {}
    fn table(&self, node: &mut Node, dom: &XmlDom, el: XmlNodeId) {}
    fn supplement(&self, node: &mut Node, dom: &XmlDom, el: XmlNodeId) {}
    fn video(&self, node: &mut Node, dom: &XmlDom, el: XmlNodeId) {}
    fn publication_info(&self, node: &mut Node, dom: &XmlDom, el: XmlNodeId) {}
    fn annotation(&self, annotation: &mut Annotation, dom: &XmlDom, el: XmlNodeId) {}
}

/// The default no-op enrichment.
pub struct NoEnhance;

impl Enhance for NoEnhance {}

/// Converts JATS/NLM article XML into a [`DocumentGraph`].
///
/// One importer can be reused across documents; all per-conversion state
/// lives in an internal context owned by each [`Importer::import`] call.
pub struct Importer {
    pub(crate) options: ImportOptions,
    pub(crate) dispatch: Dispatch,
    pub(crate) hooks: Box<dyn Enhance>,
}

impl Importer {
    pub fn new() -> Self {
        Self::with_options(ImportOptions::default())
    }

    pub fn with_options(options: ImportOptions) -> Self {
        Self {
            options,
            dispatch: Dispatch::new(),
            hooks: Box::new(NoEnhance),
        }
    }

    /// Install venue enrichment callbacks.
    pub fn with_hooks(mut self, hooks: Box<dyn Enhance>) -> Self {
        self.hooks = hooks;
        self
    }

    /// The classification tables, for venue-specific overrides.
    pub fn dispatch_mut(&mut self) -> &mut Dispatch {
        &mut self.dispatch
    }

    /// Parse and import an article from its XML source.
    pub fn import(&self, xml: &str) -> Result<DocumentGraph> {
        let dom = parse_xml(xml)?;
        self.import_dom(&dom)
    }

    /// Import an already parsed document tree.
    pub fn import_dom(&self, dom: &XmlDom) -> Result<DocumentGraph> {
        let mut state = State::new(self.options.trim_whitespace, self.options.remove_inner_ws);

        self.document(&mut state, dom)?;

        // Second pass: all nodes exist now, so forward references resolve.
        resolve::post_process_annotations(&mut state);

        Ok(state.doc)
    }
}

impl Default for Importer {
    fn default() -> Self {
        Self::new()
    }
}
