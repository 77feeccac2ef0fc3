//! Ledger and output assertions

use foxml_inliner::MetadataDocument;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One parsed ledger row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerRow {
    /// Record name
    pub record_name: String,
    /// Output path as written
    pub output_path: PathBuf,
    /// Converted flag
    pub converted: bool,
}

/// Read a ledger, checking the header, keyed by record name
///
/// Panics on duplicate rows.
pub fn read_ledger(path: &Path) -> BTreeMap<String, LedgerRow> {
    let contents = std::fs::read_to_string(path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("record_name,output_path,converted"));

    let mut rows = BTreeMap::new();
    for line in lines {
        let fields: Vec<_> = line.split(',').collect();
        assert_eq!(fields.len(), 3, "malformed ledger row: {line}");
        let row = LedgerRow {
            record_name: fields[0].to_string(),
            output_path: PathBuf::from(fields[1]),
            converted: fields[2].parse().unwrap(),
        };
        let previous = rows.insert(row.record_name.clone(), row);
        assert!(previous.is_none(), "duplicate ledger row in {line}");
    }
    rows
}

/// Control group of every datastream in a written document, by ID
pub fn control_groups(xml: &str) -> BTreeMap<String, String> {
    let document = MetadataDocument::parse(xml.as_bytes()).unwrap();
    document
        .root
        .find_all("datastream")
        .into_iter()
        .map(|ds| {
            (
                ds.attribute("ID").unwrap().to_string(),
                ds.attribute("CONTROL_GROUP").unwrap().to_string(),
            )
        })
        .collect()
}

/// Assert that no managed datastream or content reference to the record archive remains
pub fn assert_fully_inlined(xml: &str) {
    let groups = control_groups(xml);
    assert!(
        groups.values().all(|group| group != "M"),
        "managed datastream left in output: {groups:?}"
    );
    assert!(!xml.contains("INTERNAL_ID"), "content reference left in output");
}
