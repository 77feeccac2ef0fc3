//! Managed-to-inline datastream rewriting
//!
//! A managed datastream (`CONTROL_GROUP="M"`) keeps its bytes outside the
//! metadata document and points at them through `contentLocation`. Inlining
//! copies those bytes out of the record archive into the document itself and
//! drops the reference, turning the datastream into an inline one
//! (`CONTROL_GROUP="X"`).
//!
//! The rewrite is all-or-nothing: every payload is resolved before the tree
//! is touched, so a missing file leaves the document exactly as it was.

use crate::archive::{RecordArchive, base_name};
use crate::config::InlineConfig;
use crate::document::{Element, MetadataDocument};
use crate::error::{InlineError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

const DATASTREAM: &str = "datastream";
const DATASTREAM_VERSION: &str = "datastreamVersion";
const CONTENT_LOCATION: &str = "contentLocation";
const BINARY_CONTENT: &str = "binaryContent";
const XML_CONTENT: &str = "xmlContent";
const CONTROL_GROUP_ATTR: &str = "CONTROL_GROUP";

/// Content-location mode of a datastream
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlGroup {
    /// `M`: bytes live in a file next to the document
    Managed,
    /// `X`: content is embedded in the document
    Inline,
    /// `E`: content is referenced by URL
    External,
    /// `R`: content is a redirect
    Redirect,
    /// Any other value, carried verbatim
    Other(String),
}

impl ControlGroup {
    /// Parse the `CONTROL_GROUP` attribute value
    pub fn parse(value: &str) -> Self {
        match value {
            "M" => Self::Managed,
            "X" => Self::Inline,
            "E" => Self::External,
            "R" => Self::Redirect,
            other => Self::Other(other.to_string()),
        }
    }

    /// Attribute value for this mode
    pub fn as_str(&self) -> &str {
        match self {
            Self::Managed => "M",
            Self::Inline => "X",
            Self::External => "E",
            Self::Redirect => "R",
            Self::Other(value) => value,
        }
    }
}

/// Typed view over a `datastream` element
pub struct Datastream<'a> {
    element: &'a mut Element,
}

impl<'a> Datastream<'a> {
    /// Datastream ID (`<unnamed>` when the attribute is missing)
    pub fn id(&self) -> &str {
        self.element.attribute("ID").unwrap_or("<unnamed>")
    }

    /// Content-location mode; a missing attribute counts as `Other("")`
    pub fn control_group(&self) -> ControlGroup {
        ControlGroup::parse(self.element.attribute(CONTROL_GROUP_ATTR).unwrap_or(""))
    }

    /// Underlying element
    pub fn element(&self) -> &Element {
        &*self.element
    }
}

/// All datastreams of a document, in document order
pub fn datastreams(document: &mut MetadataDocument) -> Vec<Datastream<'_>> {
    document
        .root
        .find_all_mut(DATASTREAM)
        .into_iter()
        .map(|element| Datastream { element })
        .collect()
}

/// Summary of one inlining pass
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineReport {
    /// IDs of the datastreams that were rewritten
    pub inlined: Vec<String>,
    /// Number of datastream versions whose payload was embedded
    pub versions: usize,
}

/// How one version's payload will be embedded
enum Embedding {
    Binary(String),
    Markup(Element),
}

/// Rewrite every managed datastream of `document` into an inline one
///
/// Payloads are read from `record`. A document without managed datastreams
/// is left untouched, which makes the operation idempotent.
pub fn inline_managed_datastreams(
    document: &mut MetadataDocument,
    record: &mut RecordArchive,
    config: &InlineConfig,
) -> Result<InlineReport> {
    let mut managed: Vec<Datastream<'_>> = datastreams(document)
        .into_iter()
        .filter(|ds| ds.control_group() == ControlGroup::Managed)
        .collect();

    if managed.is_empty() {
        debug!(archive = %record.label().display(), "no managed datastreams");
        return Ok(InlineReport::default());
    }

    // Resolve every payload before mutating anything.
    let mut plans = Vec::with_capacity(managed.len());
    for datastream in &managed {
        plans.push(resolve_datastream(datastream, record, config)?);
    }

    let mut report = InlineReport::default();
    for (datastream, embeddings) in managed.iter_mut().zip(plans) {
        report.versions += embeddings.len();
        report.inlined.push(datastream.id().to_string());
        apply(datastream.element, embeddings);
    }

    debug!(
        archive = %record.label().display(),
        datastreams = report.inlined.len(),
        versions = report.versions,
        "inlined managed datastreams"
    );
    Ok(report)
}

fn resolve_datastream(
    datastream: &Datastream<'_>,
    record: &mut RecordArchive,
    config: &InlineConfig,
) -> Result<Vec<Embedding>> {
    let versions: Vec<&Element> = datastream
        .element()
        .child_elements()
        .filter(|child| child.local_name() == DATASTREAM_VERSION)
        .collect();

    if versions.is_empty() {
        return Err(InlineError::MalformedDatastream {
            datastream: datastream.id().to_string(),
            reason: "managed datastream has no datastreamVersion".to_string(),
        }
        .into());
    }

    let mut embeddings = Vec::with_capacity(versions.len());
    for version in versions {
        let payload = read_payload(datastream.id(), version, record)?;
        embeddings.push(embed(version, payload, config));
    }
    Ok(embeddings)
}

fn content_reference(version: &Element) -> Option<String> {
    version
        .child_elements()
        .find(|child| child.local_name() == CONTENT_LOCATION)
        .and_then(|location| location.attribute("REF"))
        .map(|reference| reference.trim().trim_start_matches('/').to_string())
        .filter(|reference| !reference.is_empty())
}

/// Locate a version's bytes: exact REF, then REF as a path suffix
///
/// Only a version without a usable REF falls back to matching its version
/// ID against file names. A REF that matches nothing is a missing payload.
fn read_payload(
    datastream_id: &str,
    version: &Element,
    record: &mut RecordArchive,
) -> Result<Vec<u8>> {
    let version_id = version.attribute("ID").unwrap_or_default().to_string();
    let reference = content_reference(version);

    let found = match &reference {
        Some(reference) => {
            let suffix = format!("/{reference}");
            let by_reference =
                |entry: &str| entry == reference.as_str() || entry.ends_with(suffix.as_str());
            record.find_file(&by_reference)?
        }
        None if !version_id.is_empty() => {
            let by_version_id = |entry: &str| base_name(entry).contains(version_id.as_str());
            record.find_file(&by_version_id)?
        }
        None => None,
    };

    match found {
        Some((entry, bytes)) => {
            debug!(datastream = datastream_id, %entry, "payload found");
            Ok(bytes)
        }
        None => Err(InlineError::MissingPayload {
            datastream: datastream_id.to_string(),
            version: version_id,
            reference,
        }
        .into()),
    }
}

fn is_xml_mimetype(mimetype: &str) -> bool {
    let essence = mimetype.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("text/xml")
        || essence.eq_ignore_ascii_case("application/xml")
        || essence.to_ascii_lowercase().ends_with("+xml")
}

fn embed(version: &Element, payload: Vec<u8>, config: &InlineConfig) -> Embedding {
    let wants_markup = config.embed_xml_as_markup
        && version.attribute("MIMETYPE").is_some_and(is_xml_mimetype);

    if wants_markup {
        match MetadataDocument::parse(&payload) {
            Ok(parsed) => return Embedding::Markup(parsed.root),
            Err(e) => debug!(error = %e, "XML payload does not parse, embedding as binary"),
        }
    }
    Embedding::Binary(STANDARD.encode(&payload))
}

fn apply(datastream: &mut Element, embeddings: Vec<Embedding>) {
    datastream.set_attribute(CONTROL_GROUP_ATTR, ControlGroup::Inline.as_str());

    let versions = datastream
        .child_elements_mut()
        .filter(|child| child.local_name() == DATASTREAM_VERSION);

    for (version, embedding) in versions.zip(embeddings) {
        version.remove_children_named(CONTENT_LOCATION);
        let content = match embedding {
            Embedding::Binary(encoded) => {
                let mut content = Element::new(version.prefixed(BINARY_CONTENT));
                content.children.push(crate::document::Node::Text(encoded));
                content
            }
            Embedding::Markup(root) => {
                let mut content = Element::new(version.prefixed(XML_CONTENT));
                content.push_element(root);
                content
            }
        };
        version.push_element(content);
    }
}
