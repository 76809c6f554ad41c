//! Read-only XML access layer.
//!
//! The importer never touches the pull parser directly; it works against the
//! arena tree built here, which provides element lookup, attribute access,
//! child iteration, and text content over the parsed document.

mod arena;
mod parser;

pub use arena::{ChildrenIter, DescendantsIter, XmlAttribute, XmlDom, XmlNode, XmlNodeData, XmlNodeId};
pub use parser::parse_xml;
