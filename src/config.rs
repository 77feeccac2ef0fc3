//! Configuration types for foxml-inliner

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which tier of the pipeline runs on the worker pool
///
/// Exactly one tier is parallelized per run. Modelling the choice as a single
/// enum keeps containers and records from both fanning out at once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    /// Containers one at a time, records one at a time
    Sequential,
    /// One worker per container, records inside a container sequential (default)
    #[default]
    Containers,
    /// Containers one at a time, records of each container on the pool
    Records,
}

impl Parallelism {
    /// Build the mode from the two command-line switches
    ///
    /// `--single-threaded` and `--parallel-records` are mutually exclusive.
    pub fn from_flags(single_threaded: bool, parallel_records: bool) -> Result<Self> {
        match (single_threaded, parallel_records) {
            (true, true) => Err(Error::config(
                "parallelism",
                "--single-threaded and --parallel-records cannot be combined",
            )),
            (true, false) => Ok(Self::Sequential),
            (false, true) => Ok(Self::Records),
            (false, false) => Ok(Self::Containers),
        }
    }
}

/// Naming and layout conventions of the archives being converted
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Extension of container archives in the input directory (default: "zip")
    #[serde(default = "default_container_extension")]
    pub container_extension: String,

    /// Path fragment every record archive entry contains (default: "data/")
    #[serde(default = "default_record_prefix")]
    pub record_prefix: String,

    /// File name suffix of record archive entries (default: "_foxml_atomzip.zip")
    #[serde(default = "default_record_suffix")]
    pub record_suffix: String,

    /// File name of the metadata document inside an archive (default: "foxml.xml")
    #[serde(default = "default_metadata_file_name")]
    pub metadata_file_name: String,

    /// File name of the ledger at the output root (default: "map.csv")
    #[serde(default = "default_ledger_file_name")]
    pub ledger_file_name: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            container_extension: default_container_extension(),
            record_prefix: default_record_prefix(),
            record_suffix: default_record_suffix(),
            metadata_file_name: default_metadata_file_name(),
            ledger_file_name: default_ledger_file_name(),
        }
    }
}

/// External tool settings (bag generator and XML formatter)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Bag generator executable (default: "drush")
    #[serde(default = "default_bag_generator_program")]
    pub bag_generator_program: PathBuf,

    /// Arguments placed before the `COLLECTION:IDENTIFIER` argument
    #[serde(default = "default_bag_generator_args")]
    pub bag_generator_args: Vec<String>,

    /// XML formatter executable (default: "xmllint")
    #[serde(default = "default_formatter_program")]
    pub formatter_program: PathBuf,

    /// Formatter arguments; the document is always passed on stdin
    #[serde(default = "default_formatter_args")]
    pub formatter_args: Vec<String>,

    /// Maximum time the formatter may run per document (default: 10s)
    #[serde(default = "default_formatter_timeout", with = "duration_serde")]
    pub formatter_timeout: Duration,

    /// Pass serialized documents through the formatter (default: true)
    #[serde(default = "default_true")]
    pub format_output: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            bag_generator_program: default_bag_generator_program(),
            bag_generator_args: default_bag_generator_args(),
            formatter_program: default_formatter_program(),
            formatter_args: default_formatter_args(),
            formatter_timeout: default_formatter_timeout(),
            format_output: true,
        }
    }
}

/// Datastream inlining behavior
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InlineConfig {
    /// Embed XML payloads as `xmlContent` markup instead of base64 `binaryContent`
    #[serde(default)]
    pub embed_xml_as_markup: bool,
}

/// Main configuration for a conversion run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the container archives
    #[serde(default)]
    pub input_dir: PathBuf,

    /// Run output directory (None = fresh unique directory under the temp dir)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Which pipeline tier runs on the worker pool
    #[serde(default)]
    pub parallelism: Parallelism,

    /// Worker pool size (None = available hardware parallelism)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Archive naming conventions
    #[serde(default)]
    pub layout: LayoutConfig,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Inlining behavior
    #[serde(default)]
    pub inline: InlineConfig,
}

impl Config {
    /// Load a configuration file (JSON); missing fields take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Check settings that would make a run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.layout.record_suffix.is_empty() {
            return Err(Error::config(
                "layout.record_suffix",
                "record suffix must not be empty",
            ));
        }
        if self.layout.metadata_file_name.is_empty() {
            return Err(Error::config(
                "layout.metadata_file_name",
                "metadata file name must not be empty",
            ));
        }
        if self.workers == Some(0) {
            return Err(Error::config("workers", "worker count must be at least 1"));
        }
        if self.tools.formatter_timeout.is_zero() {
            return Err(Error::config(
                "tools.formatter_timeout",
                "formatter timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

fn default_true() -> bool {
    true
}

fn default_container_extension() -> String {
    "zip".to_string()
}

fn default_record_prefix() -> String {
    "data/".to_string()
}

fn default_record_suffix() -> String {
    "_foxml_atomzip.zip".to_string()
}

fn default_metadata_file_name() -> String {
    "foxml.xml".to_string()
}

fn default_ledger_file_name() -> String {
    "map.csv".to_string()
}

fn default_bag_generator_program() -> PathBuf {
    PathBuf::from("drush")
}

fn default_bag_generator_args() -> Vec<String> {
    vec![
        "@dsu".into(),
        "--user=1".into(),
        "create-islandora-bag".into(),
        "object".into(),
    ]
}

fn default_formatter_program() -> PathBuf {
    PathBuf::from("xmllint")
}

fn default_formatter_args() -> Vec<String> {
    vec!["--format".into(), "-".into()]
}

fn default_formatter_timeout() -> Duration {
    Duration::from_secs(10)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
