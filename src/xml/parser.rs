//! XML parsing into the arena tree.
//!
//! Drives `quick_xml::Reader` over the source document and builds an
//! [`XmlDom`]. Text is stored verbatim, including inter-element whitespace;
//! normalization happens later during import where the surrounding context
//! is known.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::Result;
use crate::xml::arena::{XmlAttribute, XmlDom, XmlNodeId};

/// Parse an XML document string into an arena tree.
pub fn parse_xml(content: &str) -> Result<XmlDom> {
    let content = strip_bom_str(content);
    let mut reader = Reader::from_str(content);

    let mut dom = XmlDom::new();
    let mut stack: Vec<XmlNodeId> = vec![dom.document()];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = collect_attrs(&e)?;
                let node = dom.create_element(name, attrs);
                let parent = *stack.last().expect("element stack is never empty");
                dom.append(parent, node);
                stack.push(node);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let attrs = collect_attrs(&e)?;
                let node = dom.create_element(name, attrs);
                let parent = *stack.last().expect("element stack is never empty");
                dom.append(parent, node);
            }
            Event::End(_) => {
                // Tolerate spurious end tags rather than failing the import.
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Event::Text(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                let parent = *stack.last().expect("element stack is never empty");
                dom.append_text(parent, &text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                let parent = *stack.last().expect("element stack is never empty");
                dom.append_text(parent, &text);
            }
            Event::GeneralRef(e) => {
                let entity = String::from_utf8_lossy(e.as_ref()).into_owned();
                if let Some(resolved) = resolve_entity(&entity) {
                    let parent = *stack.last().expect("element stack is never empty");
                    dom.append_text(parent, &resolved);
                }
            }
            Event::Comment(e) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                let node = dom.create_comment(text);
                let parent = *stack.last().expect("element stack is never empty");
                dom.append(parent, node);
            }
            Event::Eof => break,
            // Declarations, processing instructions, doctypes carry no content.
            _ => {}
        }
    }

    Ok(dom)
}

fn collect_attrs(e: &quick_xml::events::BytesStart<'_>) -> Result<Vec<XmlAttribute>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        attrs.push(XmlAttribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: String::from_utf8_lossy(&attr.value).into_owned(),
        });
    }
    Ok(attrs)
}

/// Strip a UTF-8 byte order mark if present.
fn strip_bom_str(content: &str) -> &str {
    content.strip_prefix('\u{FEFF}').unwrap_or(content)
}

/// Resolve XML entity references.
fn resolve_entity(entity: &str) -> Option<String> {
    match entity {
        "apos" => return Some("'".to_string()),
        "quot" => return Some("\"".to_string()),
        "lt" => return Some("<".to_string()),
        "gt" => return Some(">".to_string()),
        "amp" => return Some("&".to_string()),
        _ => {}
    }

    if let Some(hex) = entity.strip_prefix("#x") {
        if let Ok(code) = u32::from_str_radix(hex, 16)
            && let Some(c) = char::from_u32(code)
        {
            return Some(c.to_string());
        }
    } else if let Some(dec) = entity.strip_prefix('#')
        && let Ok(code) = dec.parse::<u32>()
        && let Some(c) = char::from_u32(code)
    {
        return Some(c.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_document() {
        let dom = parse_xml("<article><body><p id=\"p1\">Hello</p></body></article>").unwrap();

        let article = dom.find_by_tag(dom.document(), "article").unwrap();
        assert_eq!(dom.element_name(article), Some("article"));

        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.element_id(p), Some("p1"));
        assert_eq!(dom.text_content(p), "Hello");
        assert_eq!(dom.get_by_id("p1"), Some(p));
    }

    #[test]
    fn test_parse_preserves_whitespace() {
        let dom = parse_xml("<p>  \n\tfoo   bar\n</p>").unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.text_content(p), "  \n\tfoo   bar\n");
    }

    #[test]
    fn test_parse_entities() {
        let dom = parse_xml("<p>a &amp; b &#x3B1;</p>").unwrap();
        let p = dom.find_by_tag(dom.document(), "p").unwrap();
        assert_eq!(dom.text_content(p), "a & b \u{3B1}");
    }

    #[test]
    fn test_parse_namespaced_names() {
        let dom = parse_xml(
            "<p><mml:math><mml:mi>x</mml:mi></mml:math>\
             <graphic xlink:href=\"fig1.jpg\"/></p>",
        )
        .unwrap();

        let math = dom.find_by_tag(dom.document(), "mml:math").unwrap();
        assert_eq!(dom.text_content(math), "x");

        let graphic = dom.find_by_tag(dom.document(), "graphic").unwrap();
        assert_eq!(dom.get_attr(graphic, "xlink:href"), Some("fig1.jpg"));
    }

    #[test]
    fn test_parse_empty_elements() {
        let dom = parse_xml("<article><break/><graphic xlink:href=\"a.png\"/></article>").unwrap();
        let article = dom.find_by_tag(dom.document(), "article").unwrap();
        assert_eq!(dom.child_elements(article).count(), 2);
    }
}
