//! Conversion pipeline
//!
//! A run moves through these stages:
//! 1. Detect container archives in the input directory
//! 2. Create the output directory and the ledger
//! 3. Dispatch containers, enumerating the record archives in each
//! 4. Process each record: acquire, inline, format, write, record in the ledger
//!
//! Exactly one tier runs in parallel, chosen by [`Parallelism`]. Failures
//! are isolated to the container or record they occur in.

use crate::archive::ContainerArchive;
use crate::config::{Config, Parallelism};
use crate::error::{ArchiveError, Error, Result};
use crate::ledger::Ledger;
use crate::tools::{
    BagGenerator, CliBagGenerator, CliXmlFormatter, NoOpBagGenerator, PassthroughFormatter,
    XmlFormatter,
};
use crate::types::{Event, RunSummary};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

mod acquire;
mod container;
mod record;

use container::dispatch_container;

/// Capacity of the progress event channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Shared state handed to every container and record task
pub(crate) struct PipelineContext {
    pub(crate) config: Arc<Config>,
    pub(crate) bag_generator: Arc<dyn BagGenerator>,
    pub(crate) formatter: Arc<dyn XmlFormatter>,
    pub(crate) ledger: Arc<Ledger>,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// Run blocking archive work on the blocking pool
pub(crate) async fn run_blocking<T, F>(label: PathBuf, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        Error::from(ArchiveError::OpenFailed {
            path: label,
            reason: format!("archive task panicked: {}", e),
        })
    })?
}

/// Batch converter from managed to inline metadata records
///
/// # Examples
///
/// ```no_run
/// use foxml_inliner::{Config, Converter};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config {
///     input_dir: "/data/containers".into(),
///     ..Config::default()
/// };
/// let converter = Converter::from_config(config)?;
/// let summary = converter.run().await?;
/// println!("{} converted, {} fell back", summary.converted, summary.fell_back);
/// # Ok(())
/// # }
/// ```
pub struct Converter {
    config: Arc<Config>,
    bag_generator: Arc<dyn BagGenerator>,
    formatter: Arc<dyn XmlFormatter>,
    output_dir: PathBuf,
    event_tx: broadcast::Sender<Event>,
}

impl Converter {
    /// Create a converter with explicit tool implementations
    ///
    /// The configuration is validated and the output directory resolved
    /// (a fresh `foxml_<uuid>` directory under the system temp dir when
    /// none is configured). Nothing is created on disk until [`Converter::run`].
    pub fn new(
        config: Config,
        bag_generator: Arc<dyn BagGenerator>,
        formatter: Arc<dyn XmlFormatter>,
    ) -> Result<Self> {
        config.validate()?;

        let output_dir = config.output_dir.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("foxml_{}", uuid::Uuid::new_v4()))
        });
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config: Arc::new(config),
            bag_generator,
            formatter,
            output_dir,
            event_tx,
        })
    }

    /// Create a converter that drives the configured external tools
    ///
    /// A bag generator that cannot be found degrades to [`NoOpBagGenerator`]
    /// (only container-embedded records convert). A missing formatter, or
    /// `format_output = false`, leaves documents unformatted.
    pub fn from_config(config: Config) -> Result<Self> {
        let tools = &config.tools;

        let bag_generator: Arc<dyn BagGenerator> = match which::which(&tools.bag_generator_program)
        {
            Ok(program) => Arc::new(CliBagGenerator::new(
                program,
                tools.bag_generator_args.clone(),
            )),
            Err(e) => {
                warn!(
                    program = %tools.bag_generator_program.display(),
                    error = %e,
                    "bag generator not found, records outside their container will be skipped"
                );
                Arc::new(NoOpBagGenerator)
            }
        };

        let formatter: Arc<dyn XmlFormatter> = if !tools.format_output {
            Arc::new(PassthroughFormatter)
        } else {
            match which::which(&tools.formatter_program) {
                Ok(program) => Arc::new(CliXmlFormatter::new(
                    program,
                    tools.formatter_args.clone(),
                    tools.formatter_timeout,
                )),
                Err(e) => {
                    warn!(
                        program = %tools.formatter_program.display(),
                        error = %e,
                        "formatter not found, output will not be formatted"
                    );
                    Arc::new(PassthroughFormatter)
                }
            }
        };

        info!(
            bag_generator = bag_generator.name(),
            formatter = formatter.name(),
            "external tools initialized"
        );

        Self::new(config, bag_generator, formatter)
    }

    /// Subscribe to progress events
    ///
    /// Events sent before subscribing are not replayed. Slow receivers may
    /// observe `RecvError::Lagged`; the run itself is unaffected.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory the run writes into
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the run's ledger file
    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(&self.config.layout.ledger_file_name)
    }

    /// Convert every container in the input directory
    ///
    /// Only an unreadable input directory or an output directory/ledger that
    /// cannot be created fails the run. Container and record failures are
    /// logged and counted in the returned summary.
    pub async fn run(&self) -> Result<RunSummary> {
        let input_dir = self.config.input_dir.clone();
        let extension = self.config.layout.container_extension.clone();
        let containers = run_blocking(input_dir.clone(), move || {
            ContainerArchive::detect(&input_dir, &extension)
        })
        .await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let ledger = Arc::new(Ledger::create(self.ledger_path()).await?);

        let workers = self.config.worker_count();
        let (container_workers, record_workers) = match self.config.parallelism {
            Parallelism::Sequential => (1, 1),
            Parallelism::Containers => (workers, 1),
            Parallelism::Records => (1, workers),
        };

        info!(
            input_dir = %self.config.input_dir.display(),
            output_dir = %self.output_dir.display(),
            containers = containers.len(),
            parallelism = ?self.config.parallelism,
            workers,
            "starting conversion run"
        );
        self.event_tx
            .send(Event::RunStarted {
                containers: containers.len(),
                output_dir: self.output_dir.clone(),
            })
            .ok();

        let ctx = PipelineContext {
            config: Arc::clone(&self.config),
            bag_generator: Arc::clone(&self.bag_generator),
            formatter: Arc::clone(&self.formatter),
            ledger: Arc::clone(&ledger),
            event_tx: self.event_tx.clone(),
        };

        let mut summary = RunSummary {
            output_dir: self.output_dir.clone(),
            ledger_path: ledger.path().to_path_buf(),
            ..RunSummary::default()
        };

        let total = containers.len();
        let ctx = &ctx;
        let output_dir = self.output_dir.as_path();
        let mut results = stream::iter(containers)
            .map(move |container| async move {
                let result = dispatch_container(ctx, &container, output_dir, record_workers).await;
                (container, result)
            })
            .buffer_unordered(container_workers.max(1));

        let mut completed = 0;
        while let Some((container, result)) = results.next().await {
            completed += 1;
            match result {
                Ok(report) => {
                    info!(
                        container = %container.name(),
                        records = report.records.len(),
                        "container finished"
                    );
                    summary.record_container(&report);
                }
                Err(e) => {
                    error!(
                        container = %container.name(),
                        path = %container.path().display(),
                        error = %e,
                        "container failed, skipping its records"
                    );
                    summary.containers_failed += 1;
                    self.event_tx
                        .send(Event::ContainerFailed {
                            container: container.name().to_string(),
                            error: e.to_string(),
                        })
                        .ok();
                }
            }
            self.event_tx
                .send(Event::ContainerFinished {
                    container: container.name().to_string(),
                    completed,
                    total,
                })
                .ok();
        }

        info!(
            converted = summary.converted,
            fell_back = summary.fell_back,
            dropped = summary.dropped,
            containers_failed = summary.containers_failed,
            "conversion run finished"
        );
        self.event_tx
            .send(Event::RunFinished {
                summary: summary.clone(),
            })
            .ok();

        Ok(summary)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
