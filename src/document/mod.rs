//! In-memory XML tree for metadata documents
//!
//! Documents are parsed with `quick-xml` into a small owned tree that keeps
//! qualified names (`foxml:datastream`) and attributes (including `xmlns`
//! declarations) exactly as written, so a document can be mutated and
//! serialized without namespace bookkeeping.
//!
//! Elements are looked up by local name, so `foxml:`-prefixed and
//! default-namespace documents are handled alike.

mod parser;
mod writer;

use crate::error::Result;

/// XML declaration (`<?xml version=... ?>`)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// XML version
    pub version: String,
    /// Declared encoding, if any
    pub encoding: Option<String>,
    /// Declared standalone flag, if any
    pub standalone: Option<String>,
}

/// A node inside an element
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    /// Child element
    Element(Element),
    /// Unescaped character data
    Text(String),
    /// CDATA section content
    CData(String),
    /// Comment content (raw)
    Comment(String),
    /// Processing instruction content (raw)
    ProcessingInstruction(String),
}

/// An XML element with its qualified name, attributes, and children
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name as written (`prefix:local` or `local`)
    pub name: String,
    /// Attributes in document order, names qualified as written, values unescaped
    pub attributes: Vec<(String, String)>,
    /// Child nodes in document order
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Name without its namespace prefix
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Namespace prefix of the name, if any
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Build a sibling name that reuses this element's prefix
    pub fn prefixed(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// Attribute value by exact name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its value
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let index = self.attributes.iter().position(|(key, _)| key == name)?;
        Some(self.attributes.remove(index).1)
    }

    /// Iterate over child elements
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Iterate mutably over child elements
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Append a child element
    pub fn push_element(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    /// Remove every direct child element with the given local name
    ///
    /// Returns the number of elements removed.
    pub fn remove_children_named(&mut self, local: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|node| match node {
            Node::Element(element) => element.local_name() != local,
            _ => true,
        });
        before - self.children.len()
    }

    /// Concatenated text and CDATA content of direct children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) | Node::CData(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All elements with the given local name, outermost first
    ///
    /// Matching elements are not searched further, so a match nested inside
    /// another match is not returned.
    pub fn find_all(&self, local: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        collect(self, local, &mut found);
        found
    }

    /// Mutable variant of [`Element::find_all`]
    pub fn find_all_mut(&mut self, local: &str) -> Vec<&mut Element> {
        let mut found = Vec::new();
        collect_mut(self, local, &mut found);
        found
    }
}

fn collect<'a>(element: &'a Element, local: &str, found: &mut Vec<&'a Element>) {
    if element.local_name() == local {
        found.push(element);
        return;
    }
    for child in element.child_elements() {
        collect(child, local, found);
    }
}

fn collect_mut<'a>(element: &'a mut Element, local: &str, found: &mut Vec<&'a mut Element>) {
    if element.local_name() == local {
        found.push(element);
        return;
    }
    for child in element.child_elements_mut() {
        collect_mut(child, local, found);
    }
}

/// Strip the namespace prefix from a qualified name
pub fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// A parsed metadata document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataDocument {
    /// XML declaration, if the source had one
    pub declaration: Option<Declaration>,
    /// Document element
    pub root: Element,
}

impl MetadataDocument {
    /// Parse a document from raw bytes (UTF-8, optional BOM)
    ///
    /// A source holding several top-level elements is wrapped in a synthetic
    /// `root` element instead of being rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        parser::parse_document(bytes)
    }

    /// Serialize the document to XML text
    pub fn to_xml_string(&self) -> Result<String> {
        writer::write_document(self)
    }
}
