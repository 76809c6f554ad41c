//! # docgraph
//!
//! A library for converting scientific-article XML (JATS/NLM tag set) into a
//! typed, graph-structured document model.
//!
//! ## Features
//!
//! - Single-pass recursive-descent conversion of article XML
//! - Discrete nodes (paragraphs, headings, figures, citations, footnotes,
//!   lists, tables, formulas) connected by explicit references
//! - Inline markup captured as out-of-band span annotations over plain text,
//!   with precise character offsets
//! - Two-pass reference resolution tolerating forward references
//! - Venue-specific enrichment hooks and overridable tag classification
//!
//! ## Quick Start
//!
//! ```no_run
//! use docgraph::import_file;
//!
//! let graph = import_file("article.xml").unwrap();
//!
//! // Reading order is defined by named containers.
//! for node_id in graph.container("content") {
//!     let node = graph.node(node_id).unwrap();
//!     println!("{}: {}", node.kind, node.id);
//! }
//! ```
//!
//! ## Working with the graph
//!
//! ```
//! use docgraph::import_article;
//!
//! let xml = r#"<article>
//!   <front><article-meta>
//!     <title-group><article-title>Example</article-title></title-group>
//!   </article-meta></front>
//!   <body><p>Hello <bold>world</bold>!</p></body>
//! </article>"#;
//!
//! let graph = import_article(xml).unwrap();
//! let strong = graph.annotations().iter().find(|a| a.kind == "strong").unwrap();
//! assert_eq!(strong.range, (6, 11));
//! ```

pub mod error;
pub mod graph;
pub mod import;
pub mod xml;
pub(crate) mod util;

pub use error::{Error, Result};
pub use graph::{Annotation, DocumentGraph, Node, PropertyPath, Value};
pub use import::{Dispatch, Enhance, ImportOptions, Importer, NoEnhance};

/// Import an article from its XML source with default options.
pub fn import_article(xml: &str) -> Result<DocumentGraph> {
    Importer::new().import(xml)
}

/// Import an article from a file path with default options.
pub fn import_file(path: impl AsRef<std::path::Path>) -> Result<DocumentGraph> {
    let xml = std::fs::read_to_string(path)?;
    import_article(&xml)
}
