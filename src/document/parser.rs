//! Build an [`Element`] tree from `quick-xml` events

use super::{Declaration, Element, MetadataDocument, Node};
use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

/// Name of the element wrapping documents with several top-level elements
const SYNTHETIC_ROOT: &str = "root";

pub(super) fn parse_document(bytes: &[u8]) -> Result<MetadataDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::Xml(format!("document is not valid UTF-8: {}", e)))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = Reader::from_str(text);
    let mut stack: Vec<Element> = Vec::new();
    let mut top_level: Vec<Element> = Vec::new();
    let mut declaration = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(Error::Xml(format!(
                    "parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        };

        match event {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut top_level, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::Xml("end tag without matching start tag".into()))?;
                attach(&mut stack, &mut top_level, element);
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.unescape()?.into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&cdata).into_owned()));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::PI(pi) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::ProcessingInstruction(
                        String::from_utf8_lossy(&pi).into_owned(),
                    ));
                }
            }
            Event::Decl(decl) => declaration = Some(declaration_from(&decl)),
            Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Xml(format!("unclosed element <{}>", open.name)));
    }

    let root = match top_level.len() {
        0 => return Err(Error::Xml("document has no root element".into())),
        1 => top_level.remove(0),
        count => {
            debug!(count, "wrapping multiple top-level elements in synthetic root");
            let mut root = Element::new(SYNTHETIC_ROOT);
            root.children = top_level.into_iter().map(Node::Element).collect();
            root
        }
    };

    Ok(MetadataDocument { declaration, root })
}

fn attach(stack: &mut [Element], top_level: &mut Vec<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => top_level.push(element),
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| Error::Xml(format!("invalid attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn declaration_from(decl: &BytesDecl<'_>) -> Declaration {
    let version = decl
        .version()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_else(|_| "1.0".to_string());
    let encoding = decl
        .encoding()
        .and_then(|r| r.ok())
        .map(|v| String::from_utf8_lossy(&v).into_owned());
    let standalone = decl
        .standalone()
        .and_then(|r| r.ok())
        .map(|v| String::from_utf8_lossy(&v).into_owned());
    Declaration {
        version,
        encoding,
        standalone,
    }
}
