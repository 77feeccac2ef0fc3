use super::*;
use crate::error::Error;
use crate::types::RecordOutcome;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;
use tempfile::TempDir;

const PAYLOAD: &[u8] = b"\x89PNG\r\n\x1a\n\x00binary payload\xff";

/// Bag generator that hands out pre-built bags by identifier
#[derive(Default)]
struct FakeBagGenerator {
    bags: HashMap<String, PathBuf>,
    calls: Mutex<Vec<String>>,
}

impl FakeBagGenerator {
    fn with_bag(mut self, identifier: &str, path: PathBuf) -> Self {
        self.bags.insert(identifier.to_string(), path);
        self
    }
}

#[async_trait]
impl BagGenerator for FakeBagGenerator {
    async fn generate(&self, identifier: &str) -> crate::Result<PathBuf> {
        self.calls.lock().unwrap().push(identifier.to_string());
        self.bags
            .get(identifier)
            .cloned()
            .ok_or_else(|| Error::BagNotCreated {
                identifier: identifier.to_string(),
            })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Formatter that rejects every document
struct FailingFormatter;

#[async_trait]
impl XmlFormatter for FailingFormatter {
    async fn format(&self, _xml: String) -> crate::Result<String> {
        Err(Error::ExternalTool("formatter exited with 1".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        ::zip::write::FileOptions::default().compression_method(::zip::CompressionMethod::Stored);
    for (name, content) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn foxml(pid: &str, reference: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<foxml:digitalObject xmlns:foxml="info:fedora/fedora-system:def/foxml#" PID="{pid}">
  <foxml:datastream ID="DC" CONTROL_GROUP="X">
    <foxml:datastreamVersion ID="DC.0"><foxml:xmlContent><dc>{pid}</dc></foxml:xmlContent></foxml:datastreamVersion>
  </foxml:datastream>
  <foxml:datastream ID="OBJ" CONTROL_GROUP="M">
    <foxml:datastreamVersion ID="OBJ.0" MIMETYPE="image/png">
      <foxml:contentLocation TYPE="INTERNAL_ID" REF="{reference}"/>
    </foxml:datastreamVersion>
  </foxml:datastream>
</foxml:digitalObject>
"#
    )
}

/// Scratch input/output layout for one run
struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
    bags: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        let bags = dir.path().join("bags");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&bags).unwrap();
        Self {
            _dir: dir,
            input,
            output,
            bags,
        }
    }

    fn container(&self, name: &str, files: &[(&str, &[u8])]) {
        std::fs::write(self.input.join(format!("{name}.zip")), zip_bytes(files)).unwrap();
    }

    fn bag(&self, name: &str, document: &str) -> PathBuf {
        let path = self.bags.join(format!("{name}.zip"));
        std::fs::write(
            &path,
            zip_bytes(&[(&format!("{name}/data/foxml.xml"), document.as_bytes())]),
        )
        .unwrap();
        path
    }

    fn config(&self, parallelism: Parallelism) -> Config {
        Config {
            input_dir: self.input.clone(),
            output_dir: Some(self.output.clone()),
            parallelism,
            workers: Some(4),
            ..Config::default()
        }
    }

    /// Ledger rows as `(record_name, output_path, converted)`, sorted by name
    fn ledger_rows(&self) -> Vec<(String, PathBuf, bool)> {
        let contents = std::fs::read_to_string(self.output.join("map.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some("record_name,output_path,converted"));
        let mut rows: Vec<_> = lines
            .map(|line| {
                let fields: Vec<_> = line.split(',').collect();
                assert_eq!(fields.len(), 3, "malformed ledger row: {line}");
                (
                    fields[0].to_string(),
                    PathBuf::from(fields[1]),
                    fields[2].parse::<bool>().unwrap(),
                )
            })
            .collect();
        rows.sort();
        rows
    }
}

/// Container `coll_1` with a distinguished record plus `coll_2` and `coll_3`
///
/// `coll_1` and `coll_2` carry their payloads; `coll_3` references a file
/// its record archive does not contain.
fn standard_fixture(ws: &Workspace) -> FakeBagGenerator {
    let with_payload = zip_bytes(&[("OBJ/OBJ.0.png", PAYLOAD)]);
    let without_payload = zip_bytes(&[("README.txt", b"nothing here")]);
    let coll_1_doc = foxml("coll:1", "OBJ/OBJ.0.png");
    ws.container(
        "coll_1",
        &[
            ("coll_1/bag-info.txt", b"Bag-Software-Agent: test"),
            ("coll_1/data/foxml.xml", coll_1_doc.as_bytes()),
            ("coll_1/data/coll_1_foxml_atomzip.zip", &with_payload),
            ("coll_1/data/coll_2_foxml_atomzip.zip", &with_payload),
            ("coll_1/data/coll_3_foxml_atomzip.zip", &without_payload),
        ],
    );

    FakeBagGenerator::default()
        .with_bag("coll:2", ws.bag("coll_2", &foxml("coll:2", "OBJ/OBJ.0.png")))
        .with_bag("coll:3", ws.bag("coll_3", &foxml("coll:3", "OBJ/missing.png")))
}

fn converter(config: Config, generator: FakeBagGenerator) -> Converter {
    Converter::new(config, Arc::new(generator), Arc::new(PassthroughFormatter)).unwrap()
}

#[tokio::test]
async fn distinguished_record_is_read_from_container_and_inlined() {
    let ws = Workspace::new();
    let generator = standard_fixture(&ws);
    let generator = Arc::new(generator);
    let converter = Converter::new(
        ws.config(Parallelism::Sequential),
        generator.clone(),
        Arc::new(PassthroughFormatter),
    )
    .unwrap();

    converter.run().await.unwrap();

    let output = ws.output.join("coll_1").join("coll_1").join("foxml.xml");
    let written = std::fs::read_to_string(&output).unwrap();
    assert!(!written.contains("contentLocation"));
    assert!(!written.contains(r#"CONTROL_GROUP="M""#));
    assert!(written.contains(&STANDARD.encode(PAYLOAD)));

    let document = crate::document::MetadataDocument::parse(written.as_bytes()).unwrap();
    let encoded = document.root.find_all("binaryContent")[0].text();
    assert_eq!(STANDARD.decode(encoded.trim()).unwrap(), PAYLOAD);

    // The distinguished record never goes through the generator.
    let calls = generator.calls.lock().unwrap().clone();
    assert!(!calls.contains(&"coll:1".to_string()));
    assert!(calls.contains(&"coll:2".to_string()));
}

#[tokio::test]
async fn missing_payload_falls_back_to_original_bytes() {
    let ws = Workspace::new();
    let generator = standard_fixture(&ws);
    let summary = converter(ws.config(Parallelism::Sequential), generator)
        .run()
        .await
        .unwrap();

    let output = ws.output.join("coll_1").join("coll_3").join("foxml.xml");
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        foxml("coll:3", "OBJ/missing.png")
    );
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.fell_back, 1);

    let rows = ws.ledger_rows();
    assert_eq!(rows[2], ("coll_3".to_string(), output, false));
}

#[tokio::test]
async fn formatter_failure_writes_original_bytes_unconverted() {
    let ws = Workspace::new();
    let generator = standard_fixture(&ws);
    let converter = Converter::new(
        ws.config(Parallelism::Sequential),
        Arc::new(generator),
        Arc::new(FailingFormatter),
    )
    .unwrap();

    let summary = converter.run().await.unwrap();
    assert_eq!(summary.converted, 0);
    assert_eq!(summary.fell_back, 3);

    let original = foxml("coll:2", "OBJ/OBJ.0.png");
    let output = ws.output.join("coll_1").join("coll_2").join("foxml.xml");
    assert_eq!(std::fs::read(&output).unwrap(), original.as_bytes());

    for (_, _, converted) in ws.ledger_rows() {
        assert!(!converted);
    }
}

#[tokio::test]
async fn invalid_xml_document_falls_back_to_original_bytes() {
    let ws = Workspace::new();
    let record = zip_bytes(&[("OBJ/OBJ.0.png", PAYLOAD)]);
    ws.container(
        "bad_1",
        &[
            ("bad_1/data/foxml.xml", b"<a><b></a>"),
            ("bad_1/data/bad_1_foxml_atomzip.zip", &record),
        ],
    );

    let summary = converter(ws.config(Parallelism::Sequential), FakeBagGenerator::default())
        .run()
        .await
        .unwrap();
    assert_eq!(summary.converted, 0);
    assert_eq!(summary.fell_back, 1);

    let output = ws.output.join("bad_1").join("bad_1").join("foxml.xml");
    assert_eq!(std::fs::read(&output).unwrap(), b"<a><b></a>");
    assert_eq!(ws.ledger_rows(), vec![("bad_1".to_string(), output, false)]);
}

#[tokio::test]
async fn ledger_row_survives_failed_fallback_write() {
    let ws = Workspace::new();
    let generator = standard_fixture(&ws);
    // A directory where coll_3's original bytes would be written
    let blocked = ws.output.join("coll_1").join("coll_3").join("foxml.xml");
    std::fs::create_dir_all(&blocked).unwrap();

    let summary = converter(ws.config(Parallelism::Sequential), generator)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.converted, 2);
    assert_eq!(summary.fell_back, 1);
    assert!(blocked.is_dir());

    let rows = ws.ledger_rows();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], ("coll_3".to_string(), blocked, false));
}

#[tokio::test]
async fn record_without_generated_bag_is_dropped() {
    let ws = Workspace::new();
    let with_payload = zip_bytes(&[("OBJ/OBJ.0.png", PAYLOAD)]);
    let coll_1_doc = foxml("coll:1", "OBJ/OBJ.0.png");
    ws.container(
        "coll_1",
        &[
            ("coll_1/data/foxml.xml", coll_1_doc.as_bytes()),
            ("coll_1/data/coll_1_foxml_atomzip.zip", &with_payload),
            ("coll_1/data/coll_404_foxml_atomzip.zip", &with_payload),
            ("coll_1/data/nounderscore_foxml_atomzip.zip", &with_payload),
        ],
    );

    let summary = converter(ws.config(Parallelism::Sequential), FakeBagGenerator::default())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.converted, 1);
    assert_eq!(summary.dropped, 2);
    assert!(!ws.output.join("coll_1").join("coll_404").exists());

    let names: Vec<_> = ws.ledger_rows().into_iter().map(|row| row.0).collect();
    assert_eq!(names, vec!["coll_1"]);
}

#[tokio::test]
async fn malformed_container_does_not_stop_the_run() {
    let ws = Workspace::new();
    std::fs::write(ws.input.join("broken_9.zip"), b"this is not an archive").unwrap();
    let generator = standard_fixture(&ws);

    let summary = converter(ws.config(Parallelism::Containers), generator)
        .run()
        .await
        .unwrap();

    assert_eq!(summary.containers_failed, 1);
    assert_eq!(summary.containers_processed, 1);

    let rows: Vec<_> = ws
        .ledger_rows()
        .into_iter()
        .map(|(name, _, converted)| (name, converted))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("coll_1".to_string(), true),
            ("coll_2".to_string(), true),
            ("coll_3".to_string(), false),
        ]
    );
}

#[tokio::test]
async fn ledger_rows_match_across_parallelism_modes() {
    let mut results = Vec::new();
    for parallelism in [
        Parallelism::Sequential,
        Parallelism::Containers,
        Parallelism::Records,
    ] {
        let ws = Workspace::new();
        let generator = standard_fixture(&ws);
        let with_payload = zip_bytes(&[("OBJ/OBJ.0.png", PAYLOAD)]);
        let coll_5_doc = foxml("coll:5", "OBJ/OBJ.0.png");
        ws.container(
            "coll_5",
            &[
                ("coll_5/data/foxml.xml", coll_5_doc.as_bytes()),
                ("coll_5/data/coll_5_foxml_atomzip.zip", &with_payload),
            ],
        );

        converter(ws.config(parallelism), generator).run().await.unwrap();

        let rows: Vec<_> = ws
            .ledger_rows()
            .into_iter()
            .map(|(name, _, converted)| (name, converted))
            .collect();
        results.push(rows);
    }

    assert_eq!(results[0].len(), 4);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
}

#[tokio::test]
async fn progress_events_bracket_the_run() {
    let ws = Workspace::new();
    std::fs::write(ws.input.join("broken_9.zip"), b"garbage").unwrap();
    let generator = standard_fixture(&ws);
    let converter = converter(ws.config(Parallelism::Sequential), generator);
    let mut rx = converter.subscribe();

    converter.run().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(matches!(events.first(), Some(Event::RunStarted { containers: 2, .. })));
    assert!(matches!(events.last(), Some(Event::RunFinished { .. })));

    let failed = events
        .iter()
        .filter(|e| matches!(e, Event::ContainerFailed { container, .. } if container == "broken_9"))
        .count();
    assert_eq!(failed, 1);

    let records: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::RecordFinished { record, converted, .. } => Some((record.clone(), *converted)),
            _ => None,
        })
        .collect();
    assert_eq!(records.len(), 3);
    assert!(records.contains(&("coll_3".to_string(), Some(false))));

    let finished: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::ContainerFinished { completed, total, .. } => Some((*completed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(finished, vec![(1, 2), (2, 2)]);
}

#[tokio::test]
async fn unreadable_input_directory_fails_the_run() {
    let ws = Workspace::new();
    let mut config = ws.config(Parallelism::Sequential);
    config.input_dir = ws.input.join("does-not-exist");

    let result = converter(config, FakeBagGenerator::default()).run().await;
    assert!(matches!(result, Err(Error::Io(_))));
    assert!(!ws.output.join("map.csv").exists());
}

#[tokio::test]
async fn empty_input_directory_yields_header_only_ledger() {
    let ws = Workspace::new();
    let summary = converter(ws.config(Parallelism::Containers), FakeBagGenerator::default())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.containers_processed, 0);
    assert!(ws.ledger_rows().is_empty());
}

#[test]
fn default_output_dir_is_unique_under_temp() {
    let config = Config {
        input_dir: PathBuf::from("/in"),
        ..Config::default()
    };
    let a = converter(config.clone(), FakeBagGenerator::default());
    let b = converter(config, FakeBagGenerator::default());

    assert_ne!(a.output_dir(), b.output_dir());
    assert!(a.output_dir().starts_with(std::env::temp_dir()));
    let name = a.output_dir().file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("foxml_"));
    assert_eq!(a.ledger_path(), a.output_dir().join("map.csv"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = Config {
        workers: Some(0),
        ..Config::default()
    };
    let result = Converter::new(
        config,
        Arc::new(FakeBagGenerator::default()),
        Arc::new(PassthroughFormatter),
    );
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[test]
fn record_outcome_reports_name() {
    let dropped = RecordOutcome::Dropped {
        record_name: "coll_404".to_string(),
        reason: "no bag".to_string(),
    };
    assert_eq!(dropped.record_name(), "coll_404");
}
