//! # foxml-inliner
//!
//! Batch converter that rewrites archived FOXML metadata records from the
//! managed layout (datastreams pointing at files beside the record) to the
//! inline layout (payloads embedded in the document itself).
//!
//! ## Design Philosophy
//!
//! - **Every record accounted for** - each acquired record yields one output
//!   file and one ledger row, converted or not
//! - **Failures stay local** - a broken container or record never stops a run
//! - **Pluggable tools** - the bag generator and formatter sit behind traits
//! - **Event-driven** - consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use foxml_inliner::{Config, Converter, Parallelism};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         input_dir: "/data/containers".into(),
//!         parallelism: Parallelism::Records,
//!         ..Default::default()
//!     };
//!
//!     let converter = Converter::from_config(config)?;
//!
//!     // Subscribe to events
//!     let mut events = converter.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = converter.run().await?;
//!     println!("ledger written to {}", summary.ledger_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Container and record archive access
pub mod archive;
/// Configuration types
pub mod config;
/// In-memory XML document model
pub mod document;
/// Error types
pub mod error;
/// Managed-to-inline datastream rewriting
pub mod inline;
/// Conversion outcome ledger
pub mod ledger;
/// Conversion pipeline
pub mod pipeline;
/// External tool adapters
pub mod tools;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, InlineConfig, LayoutConfig, Parallelism, ToolsConfig};
pub use document::{Element, MetadataDocument};
pub use error::{ArchiveError, Error, InlineError, Result};
pub use inline::{ControlGroup, InlineReport, inline_managed_datastreams};
pub use ledger::Ledger;
pub use pipeline::Converter;
pub use tools::{
    BagGenerator, CliBagGenerator, CliXmlFormatter, NoOpBagGenerator, PassthroughFormatter,
    XmlFormatter,
};
pub use types::{ConversionOutcome, ContainerReport, Event, RecordOutcome, RunSummary};
